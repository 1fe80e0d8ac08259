use std::cmp::Ordering;

use tracing::{debug, info};

use super::config::{CreditsConfig, CREDITS_ROLE_ANCHORS, RATING_TOKENS, URL_TOKENS};
use super::geom::{self, effective_geometry, points_bbox};
use super::{
    BBoxNorm, BandKind, CreditsBandDetection, CreditsBlock, CreditsOverlayElement, LineRegion,
    NormPoint, OverlayKind, RegionGeometry,
};

/// Two-pass credits-band detection. Pass 1 peels overlay elements (logos,
/// badges, URLs, handles) off the candidate band; pass 2 clusters what is
/// left and scores the clusters as credits candidates.
///
/// Returns `None` only when neither band holds a single region. A band
/// with members but no acceptable cluster still yields a detection, with
/// `credits_block: None`.
pub fn detect_credits_band(
    regions: &[LineRegion],
    config: &CreditsConfig,
) -> Option<CreditsBandDetection> {
    let selection = select_candidate_band(regions, config);
    if selection.members.is_empty() {
        debug!(
            "credits band {} has no candidate regions",
            selection.band.as_str()
        );
        return None;
    }
    debug!(
        "credits band {} selected regions={}",
        selection.band.as_str(),
        selection.members.len()
    );

    let (overlays, residuals) = extract_overlays(regions, &selection.members, config);
    debug!(
        "credits overlays extracted overlays={} residual={}",
        overlays.len(),
        residuals.len()
    );

    let credits_block = if residuals.is_empty() {
        None
    } else {
        select_block(regions, &residuals, &selection.bbox, config)
    };

    Some(CreditsBandDetection {
        band_name: selection.band,
        band_bbox: selection.bbox,
        overlays,
        credits_block,
    })
}

/// Pass 2: cluster the residuals, score every cluster, keep the best one
/// if it clears the acceptance threshold.
fn select_block(
    regions: &[LineRegion],
    residuals: &[usize],
    band_bbox: &BBoxNorm,
    config: &CreditsConfig,
) -> Option<CreditsBlock> {
    let clusters = cluster_residuals(regions, residuals, config);
    let mut scored: Vec<(f32, ClusterStats, Vec<usize>)> = clusters
        .into_iter()
        .map(|members| {
            let (score, stats) = score_cluster(regions, &members, band_bbox, config);
            (score, stats, members)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let (best_score, best_stats, best_members) = scored.into_iter().next()?;
    debug!(
        "credits clusters scored best_score={:.2} lines={} median_font={:.4} density={:.1} angle_std={:.1} lex={:.2}",
        best_score,
        best_stats.line_count,
        best_stats.median_font_height,
        best_stats.density,
        best_stats.angle_std,
        best_stats.lex_boost
    );
    if best_score < config.min_acceptance_score {
        debug!(
            "credits block rejected score={:.2} threshold={:.1}",
            best_score, config.min_acceptance_score
        );
        return None;
    }

    let dominant_angle = best_stats.angle_mean;
    let mut vertices: Vec<NormPoint> = Vec::with_capacity(best_members.len() * 4);
    for &index in &best_members {
        vertices.extend_from_slice(&effective_geometry(&regions[index]).quad);
    }
    let bbox = points_bbox(&vertices).unwrap_or(BBoxNorm {
        x1: 0.0,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    });
    let geometry = RegionGeometry {
        quad: geom::quad_from_bbox(&bbox),
        center: bbox.center(),
        angle_deg: dominant_angle,
        bbox,
    };
    let confidence = (best_score / config.confidence_divisor).min(1.0);

    info!(
        "credits block selected score={:.2} confidence={:.3} lines={} angle={:.1}",
        best_score,
        confidence,
        best_members.len(),
        dominant_angle
    );

    Some(CreditsBlock {
        geometry,
        dominant_angle_deg: dominant_angle,
        credit_groups: Vec::new(),
        confidence,
        score: best_score,
    })
}

struct BandSelection {
    band: BandKind,
    bbox: BBoxNorm,
    members: Vec<usize>,
}

/// Bottom band wins over the top-lite fallback. With no match in either,
/// reports the bottom band with zero members.
fn select_candidate_band(regions: &[LineRegion], config: &CreditsConfig) -> BandSelection {
    let members_in = |range: (f32, f32)| -> Vec<usize> {
        regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.bbox.y1 >= range.0 && region.bbox.y1 <= range.1)
            .map(|(index, _)| index)
            .collect()
    };

    let bottom = members_in(config.band_bottom);
    if !bottom.is_empty() {
        return BandSelection {
            band: BandKind::BottomBand,
            bbox: band_bbox(config.band_bottom),
            members: bottom,
        };
    }
    let top = members_in(config.band_top_lite);
    if !top.is_empty() {
        return BandSelection {
            band: BandKind::TopLiteBand,
            bbox: band_bbox(config.band_top_lite),
            members: top,
        };
    }
    BandSelection {
        band: BandKind::BottomBand,
        bbox: band_bbox(config.band_bottom),
        members: Vec::new(),
    }
}

fn band_bbox(range: (f32, f32)) -> BBoxNorm {
    BBoxNorm {
        x1: 0.0,
        y1: range.0,
        x2: 1.0,
        y2: range.1,
    }
}

/// Pass 1. Every member lands in exactly one of overlays or residuals.
fn extract_overlays(
    regions: &[LineRegion],
    members: &[usize],
    config: &CreditsConfig,
) -> (Vec<CreditsOverlayElement>, Vec<usize>) {
    let mut overlays = Vec::new();
    let mut residuals = Vec::new();
    for &index in members {
        let region = &regions[index];
        let geometry = effective_geometry(region);
        match overlay_kind(&region.text, &geometry.bbox, config) {
            Some(kind) => overlays.push(CreditsOverlayElement {
                kind,
                text: Some(region.text.clone()),
                geometry,
                locked: true,
            }),
            None => residuals.push(index),
        }
    }
    (overlays, residuals)
}

/// First matching rule wins; rule order is load-bearing.
fn overlay_kind(text: &str, bbox: &BBoxNorm, config: &CreditsConfig) -> Option<OverlayKind> {
    if text.contains('@') {
        return Some(OverlayKind::SocialHandle);
    }
    let upper = text.to_uppercase();
    if URL_TOKENS.iter().any(|token| upper.contains(token)) {
        return Some(OverlayKind::Url);
    }
    if bbox.area() < config.overlay_area_small {
        return Some(OverlayKind::Logo);
    }
    if bbox.height() < config.overlay_height_tiny
        && geom::aspect_ratio(bbox) > config.overlay_aspect_wide
    {
        return Some(OverlayKind::Unknown);
    }
    if RATING_TOKENS.iter().any(|token| upper.contains(token)) {
        return Some(OverlayKind::RatingBadge);
    }
    None
}

struct Cluster {
    members: Vec<usize>,
    y1_sum: f32,
    envelope: BBoxNorm,
}

/// Greedy single pass over residuals sorted by `(y1, x1)`. Running y1 sum
/// and x-envelope stand in for rescanning members on every test.
fn cluster_residuals(
    regions: &[LineRegion],
    residuals: &[usize],
    config: &CreditsConfig,
) -> Vec<Vec<usize>> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|&a, &b| {
        (regions[a].bbox.y1, regions[a].bbox.x1)
            .partial_cmp(&(regions[b].bbox.y1, regions[b].bbox.x1))
            .unwrap_or(Ordering::Equal)
    });

    let mut clusters: Vec<Cluster> = Vec::new();
    for index in sorted {
        let bbox = regions[index].bbox;
        let joined = clusters.iter_mut().find(|cluster| {
            let mean_y1 = cluster.y1_sum / cluster.members.len() as f32;
            (bbox.y1 - mean_y1).abs() <= config.cluster_dy_max
                && geom::horizontal_overlap_ratio(&bbox, &cluster.envelope)
                    > config.cluster_x_overlap_min
        });
        match joined {
            Some(cluster) => {
                cluster.members.push(index);
                cluster.y1_sum += bbox.y1;
                cluster.envelope = geom::union_bbox(&cluster.envelope, &bbox);
            }
            None => clusters.push(Cluster {
                members: vec![index],
                y1_sum: bbox.y1,
                envelope: bbox,
            }),
        }
    }
    clusters.into_iter().map(|cluster| cluster.members).collect()
}

struct ClusterStats {
    line_count: usize,
    median_font_height: f32,
    angle_mean: f32,
    angle_std: f32,
    density: f32,
    lex_boost: f32,
}

fn score_cluster(
    regions: &[LineRegion],
    members: &[usize],
    band_bbox: &BBoxNorm,
    config: &CreditsConfig,
) -> (f32, ClusterStats) {
    let mut font_heights = Vec::with_capacity(members.len());
    let mut angles = Vec::with_capacity(members.len());
    let mut bbox: Option<BBoxNorm> = None;
    let mut anchored_lines = 0usize;

    for &index in members {
        let region = &regions[index];
        let geometry = effective_geometry(region);
        font_heights.push(geometry.bbox.height());
        angles.push(geometry.angle_deg);
        bbox = Some(match bbox {
            Some(current) => geom::union_bbox(&current, &region.bbox),
            None => region.bbox,
        });
        let lower = region.text.to_lowercase();
        if CREDITS_ROLE_ANCHORS
            .iter()
            .any(|anchor| lower.contains(anchor))
        {
            anchored_lines += 1;
        }
    }

    let line_count = members.len();
    let bbox = bbox.unwrap_or(BBoxNorm {
        x1: 0.0,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    });
    let median_font_height = geom::median(&font_heights).unwrap_or(0.1);
    let angle_mean = geom::mean(&angles).unwrap_or(0.0);
    let angle_std = geom::sample_stdev(&angles);
    let density = line_count as f32 / bbox.height().max(0.001);
    let lex_boost = if line_count == 0 {
        0.0
    } else {
        anchored_lines as f32 / line_count as f32
    };

    let mut score = 0.0;
    if line_count >= config.score_min_lines {
        score += 1.0;
    }
    if median_font_height <= config.score_font_height_max {
        score += 1.0;
    }
    if density > config.score_density_min {
        score += 1.0;
    }
    let band_center_y = (band_bbox.y1 + band_bbox.y2) / 2.0;
    if bbox.center().y > band_center_y {
        score += 0.5;
    }
    if angle_std <= config.score_angle_std_max {
        score += 0.5;
    }
    score += lex_boost;

    (
        score,
        ClusterStats {
            line_count,
            median_font_height,
            angle_mean,
            angle_std,
            density,
            lex_boost,
        },
    )
}
