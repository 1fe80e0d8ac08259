mod config;
mod credits;
mod geom;
mod groups;
mod lines;

pub use config::{CreditsConfig, CREDITS_ROLE_ANCHORS};
pub use credits::detect_credits_band;
pub use geom::{
    angle_degrees, aspect_ratio, geometry_from_bbox, geometry_from_quad,
    horizontal_overlap_ratio, normalize_vertex_order, quad_from_bbox, union_bbox,
};
pub use groups::{build_credit_lines, group_credit_lines};
pub use lines::reconstruct_lines;

/// Point in normalized image space. Both axes are in `[0, 1]`, y grows
/// downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl serde::Serialize for NormPoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        [self.x, self.y].serialize(serializer)
    }
}

/// Quadrilateral in TL, TR, BR, BL order.
pub type Quad = [NormPoint; 4];

/// Axis-aligned box in normalized image space, serialized as
/// `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBoxNorm {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBoxNorm {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> NormPoint {
        NormPoint {
            x: (self.x1 + self.x2) / 2.0,
            y: (self.y1 + self.y2) / 2.0,
        }
    }
}

impl serde::Serialize for BBoxNorm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        [self.x1, self.y1, self.x2, self.y2].serialize(serializer)
    }
}

/// Full geometry of a detected region: oriented quad plus the axis-aligned
/// envelope derived from it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegionGeometry {
    pub quad: Quad,
    pub center: NormPoint,
    pub angle_deg: f32,
    pub bbox: BBoxNorm,
}

/// Single OCR word with normalized geometry, the input unit of line
/// reconstruction.
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub geometry: RegionGeometry,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextRole {
    Title,
    Tagline,
    Credits,
    Other,
}

impl TextRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextRole::Title => "title",
            TextRole::Tagline => "tagline",
            TextRole::Credits => "credits",
            TextRole::Other => "other",
        }
    }
}

/// Reconstructed text line. `geometry` is absent for degenerate regions
/// that only carry an axis-aligned box.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LineRegion {
    pub text: String,
    pub bbox: BBoxNorm,
    pub role: TextRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<RegionGeometry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayKind {
    SocialHandle,
    Url,
    Logo,
    RatingBadge,
    Unknown,
}

/// Discrete element filtered out of the candidate band in pass 1. Overlays
/// are always locked: they are never translated or grouped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreditsOverlayElement {
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub geometry: RegionGeometry,
    pub locked: bool,
}

/// Single line of credits text, annotated with the role-anchor phrases it
/// contains.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreditLine {
    pub text: String,
    pub geometry: RegionGeometry,
    pub font_height_norm: f32,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditGroupKind {
    Title,
    ProperName,
    Certification,
    /// Reserved for groups locked by an overlay element.
    LogoIgnored,
    Unknown,
}

/// Over/under pair (role line above name line) or a singleton credit line.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreditGroup {
    #[serde(rename = "type")]
    pub kind: CreditGroupKind,
    pub lines: Vec<CreditLine>,
    pub geometry: RegionGeometry,
    pub localizable: bool,
    pub confidence: f32,
}

/// Winning cluster of pass 2, simplified to its axis-aligned envelope.
/// `credit_groups` starts empty and is filled once the crop has been
/// re-OCR'd and grouped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreditsBlock {
    pub geometry: RegionGeometry,
    pub dominant_angle_deg: f32,
    pub credit_groups: Vec<CreditGroup>,
    pub confidence: f32,
    #[serde(skip_serializing)]
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandKind {
    BottomBand,
    TopLiteBand,
}

impl BandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BandKind::BottomBand => "BOTTOM_BAND",
            BandKind::TopLiteBand => "TOP_LITE_BAND",
        }
    }
}

/// Outcome of a credits-band pass over one image. `credits_block` is
/// `None` when the band held no dense cluster worth accepting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreditsBandDetection {
    pub band_name: BandKind,
    pub band_bbox: BBoxNorm,
    pub overlays: Vec<CreditsOverlayElement>,
    pub credits_block: Option<CreditsBlock>,
}
