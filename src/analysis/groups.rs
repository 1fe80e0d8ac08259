use tracing::debug;

use super::config::{CreditsConfig, CERTIFICATION_MARKS, CREDITS_ROLE_ANCHORS};
use super::geom::{self, effective_geometry};
use super::{CreditGroup, CreditGroupKind, CreditLine, LineRegion, RegionGeometry};

/// Annotates a region as a credit line: font height proxied by bbox
/// height, hints listing every role anchor the text contains.
pub(super) fn credit_line(region: &LineRegion) -> CreditLine {
    let geometry = effective_geometry(region);
    let lower = region.text.to_lowercase();
    let hints = CREDITS_ROLE_ANCHORS
        .iter()
        .filter(|anchor| lower.contains(*anchor))
        .map(|anchor| anchor.to_string())
        .collect();
    CreditLine {
        text: region.text.clone(),
        font_height_norm: geometry.bbox.height(),
        geometry,
        hints,
    }
}

pub fn build_credit_lines(regions: &[LineRegion]) -> Vec<CreditLine> {
    regions.iter().map(credit_line).collect()
}

/// Groups credit lines into over/under pairs (small role line above a
/// larger name line) and singletons, then classifies each group.
pub fn group_credit_lines(lines: &[CreditLine], config: &CreditsConfig) -> Vec<CreditGroup> {
    if lines.is_empty() {
        return Vec::new();
    }

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (i, above) in lines.iter().enumerate() {
        for (j, below) in lines.iter().enumerate().skip(i + 1) {
            if above.font_height_norm >= below.font_height_norm {
                continue;
            }
            let gap = (below.geometry.center.y - above.geometry.center.y).abs();
            if gap > config.over_under_max_gap_y {
                continue;
            }
            let overlap =
                geom::horizontal_overlap_ratio(&above.geometry.bbox, &below.geometry.bbox);
            if overlap >= config.over_under_x_overlap_min {
                pairs.push((i, j));
            }
        }
    }
    if !pairs.is_empty() {
        debug!("credits over/under candidates={}", pairs.len());
    }

    // Pairs consume their lines greedily in discovery order.
    let mut used = vec![false; lines.len()];
    let mut groups: Vec<CreditGroup> = Vec::new();
    for (i, j) in pairs {
        if used[i] || used[j] {
            continue;
        }
        let above = &lines[i];
        let below = &lines[j];
        let kind = classify_group(&[above, below]);
        let bbox = geom::union_bbox(&above.geometry.bbox, &below.geometry.bbox);
        groups.push(CreditGroup {
            lines: vec![above.clone(), below.clone()],
            kind,
            geometry: RegionGeometry {
                // First line's quad stands in for the union.
                quad: above.geometry.quad,
                bbox,
                center: bbox.center(),
                angle_deg: (above.geometry.angle_deg + below.geometry.angle_deg) / 2.0,
            },
            confidence: config.group_conf_paired,
            localizable: kind == CreditGroupKind::Title,
        });
        used[i] = true;
        used[j] = true;
    }

    for (index, line) in lines.iter().enumerate() {
        if used[index] {
            continue;
        }
        let kind = classify_group(&[line]);
        groups.push(CreditGroup {
            lines: vec![line.clone()],
            kind,
            geometry: line.geometry.clone(),
            confidence: config.group_conf_single,
            localizable: kind == CreditGroupKind::Title,
        });
    }

    let localizable = groups.iter().filter(|group| group.localizable).count();
    debug!(
        "credits grouping groups={} localizable={}",
        groups.len(),
        localizable
    );
    groups
}

/// Fixed-priority classification; later rules only run when earlier ones
/// matched nothing across the whole group.
fn classify_group(lines: &[&CreditLine]) -> CreditGroupKind {
    for line in lines {
        let text = line.text.trim();
        if text.chars().count() < 10
            && is_upper(text)
            && text.contains('.')
            && CERTIFICATION_MARKS.iter().any(|mark| text.contains(mark))
        {
            return CreditGroupKind::Certification;
        }
    }
    for line in lines {
        let lower = line.text.to_lowercase();
        if CREDITS_ROLE_ANCHORS
            .iter()
            .any(|anchor| lower.contains(anchor))
        {
            return CreditGroupKind::Title;
        }
    }
    for line in lines {
        let words: Vec<&str> = line.text.trim().split_whitespace().collect();
        if words.len() >= 2 {
            let capitalized = words
                .iter()
                .filter(|word| word.chars().next().is_some_and(char::is_uppercase))
                .count();
            if capitalized as f32 >= words.len() as f32 * 0.7 {
                return CreditGroupKind::ProperName;
            }
        }
    }
    CreditGroupKind::Unknown
}

/// At least one cased character and no lowercase ones.
fn is_upper(text: &str) -> bool {
    let mut has_cased = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}
