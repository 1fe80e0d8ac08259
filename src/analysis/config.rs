/// Role phrases that anchor credits text, lowercase. Shared by the band
/// scorer's lexicon boost and the group classifier.
pub const CREDITS_ROLE_ANCHORS: [&str; 14] = [
    "directed by",
    "written by",
    "screenplay by",
    "story by",
    "produced by",
    "executive producer",
    "executive producers",
    "director of photography",
    "production designer",
    "music by",
    "edited by",
    "casting by",
    "based on",
    "a film by",
];

pub(super) const URL_TOKENS: [&str; 7] = [
    ".COM", ".NET", ".ORG", ".IO", "HTTP://", "HTTPS://", "WWW.",
];

pub(super) const RATING_TOKENS: [&str; 6] = ["RATED", "PG", "G", "R", "NC-17", "MPAA"];

pub(super) const CERTIFICATION_MARKS: [&str; 4] = ["A.C.E.", "ASC", "A.S.C.", "MPAA"];

/// Thresholds for credits-band detection and line grouping. Values are
/// tuned against theatrical one-sheet layouts; treat them as a set.
#[derive(Debug, Clone)]
pub struct CreditsConfig {
    /// Band of bbox top edges treated as the bottom credits band.
    pub band_bottom: (f32, f32),
    /// Fallback band near the top of the poster.
    pub band_top_lite: (f32, f32),
    /// Below this normalized area a region reads as a logo mark.
    pub overlay_area_small: f32,
    /// Height bound of the thin-wide overlay rule.
    pub overlay_height_tiny: f32,
    /// Aspect bound of the thin-wide overlay rule.
    pub overlay_aspect_wide: f32,
    /// Max distance between a region top edge and the cluster mean.
    pub cluster_dy_max: f32,
    /// Min horizontal overlap ratio to join a cluster.
    pub cluster_x_overlap_min: f32,
    pub score_min_lines: usize,
    pub score_font_height_max: f32,
    pub score_density_min: f32,
    pub score_angle_std_max: f32,
    /// Clusters scoring below this are rejected outright.
    pub min_acceptance_score: f32,
    pub confidence_divisor: f32,
    /// Max vertical center gap of an over/under pair.
    pub over_under_max_gap_y: f32,
    /// Min horizontal overlap ratio of an over/under pair.
    pub over_under_x_overlap_min: f32,
    pub group_conf_paired: f32,
    pub group_conf_single: f32,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        CreditsConfig {
            band_bottom: (0.70, 1.00),
            band_top_lite: (0.00, 0.25),
            overlay_area_small: 0.0020,
            overlay_height_tiny: 0.030,
            overlay_aspect_wide: 3.5,
            cluster_dy_max: 0.02,
            cluster_x_overlap_min: 0.2,
            score_min_lines: 8,
            score_font_height_max: 0.030,
            score_density_min: 10.0,
            score_angle_std_max: 8.0,
            min_acceptance_score: 2.0,
            confidence_divisor: 5.0,
            over_under_max_gap_y: 0.012,
            over_under_x_overlap_min: 0.65,
            group_conf_paired: 0.8,
            group_conf_single: 0.6,
        }
    }
}
