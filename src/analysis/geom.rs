use std::cmp::Ordering;

use super::{BBoxNorm, LineRegion, NormPoint, Quad, RegionGeometry};

/// Reorders four vertices into TL, TR, BR, BL. Returns `None` unless
/// exactly four vertices are given; callers fall back to bbox-derived
/// geometry in that case.
pub fn normalize_vertex_order(vertices: &[NormPoint]) -> Option<Quad> {
    if vertices.len() != 4 {
        return None;
    }
    let mut sorted = vertices.to_vec();
    sorted.sort_by(|a, b| {
        (a.y, a.x)
            .partial_cmp(&(b.y, b.x))
            .unwrap_or(Ordering::Equal)
    });

    let (tl, tr) = if sorted[0].x <= sorted[1].x {
        (sorted[0], sorted[1])
    } else {
        (sorted[1], sorted[0])
    };
    let (br, bl) = if sorted[2].x >= sorted[3].x {
        (sorted[2], sorted[3])
    } else {
        (sorted[3], sorted[2])
    };
    Some([tl, tr, br, bl])
}

pub fn quad_bbox(quad: &Quad) -> BBoxNorm {
    let mut x1 = quad[0].x;
    let mut y1 = quad[0].y;
    let mut x2 = quad[0].x;
    let mut y2 = quad[0].y;
    for point in &quad[1..] {
        x1 = x1.min(point.x);
        y1 = y1.min(point.y);
        x2 = x2.max(point.x);
        y2 = y2.max(point.y);
    }
    BBoxNorm { x1, y1, x2, y2 }
}

pub(super) fn points_bbox(points: &[NormPoint]) -> Option<BBoxNorm> {
    let first = points.first()?;
    let mut bbox = BBoxNorm {
        x1: first.x,
        y1: first.y,
        x2: first.x,
        y2: first.y,
    };
    for point in &points[1..] {
        bbox.x1 = bbox.x1.min(point.x);
        bbox.y1 = bbox.y1.min(point.y);
        bbox.x2 = bbox.x2.max(point.x);
        bbox.y2 = bbox.y2.max(point.y);
    }
    Some(bbox)
}

pub fn union_bbox(a: &BBoxNorm, b: &BBoxNorm) -> BBoxNorm {
    BBoxNorm {
        x1: a.x1.min(b.x1),
        y1: a.y1.min(b.y1),
        x2: a.x2.max(b.x2),
        y2: a.y2.max(b.y2),
    }
}

/// Width over height; degenerate heights report 1.0 so downstream ratio
/// checks stay inert.
pub fn aspect_ratio(bbox: &BBoxNorm) -> f32 {
    let height = bbox.height();
    if height <= 0.0 {
        return 1.0;
    }
    bbox.width() / height
}

/// Baseline angle of the quad's top edge, in degrees, `(-180, 180]`.
pub fn angle_degrees(quad: &Quad) -> f32 {
    let dx = quad[1].x - quad[0].x;
    let dy = quad[1].y - quad[0].y;
    dy.atan2(dx).to_degrees()
}

/// Horizontal intersection over the wider of the two boxes.
pub fn horizontal_overlap_ratio(a: &BBoxNorm, b: &BBoxNorm) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let ix2 = a.x2.min(b.x2);
    if ix2 <= ix1 {
        return 0.0;
    }
    (ix2 - ix1) / a.width().max(b.width()).max(0.001)
}

pub fn quad_from_bbox(bbox: &BBoxNorm) -> Quad {
    [
        NormPoint {
            x: bbox.x1,
            y: bbox.y1,
        },
        NormPoint {
            x: bbox.x2,
            y: bbox.y1,
        },
        NormPoint {
            x: bbox.x2,
            y: bbox.y2,
        },
        NormPoint {
            x: bbox.x1,
            y: bbox.y2,
        },
    ]
}

pub fn geometry_from_quad(quad: Quad) -> RegionGeometry {
    let bbox = quad_bbox(&quad);
    RegionGeometry {
        angle_deg: angle_degrees(&quad),
        center: bbox.center(),
        quad,
        bbox,
    }
}

/// Synthetic axis-aligned geometry for regions that only carry a box.
pub fn geometry_from_bbox(bbox: &BBoxNorm) -> RegionGeometry {
    RegionGeometry {
        quad: quad_from_bbox(bbox),
        bbox: *bbox,
        center: bbox.center(),
        angle_deg: 0.0,
    }
}

/// The region's own geometry, or the bbox-derived fallback.
pub(super) fn effective_geometry(region: &LineRegion) -> RegionGeometry {
    match &region.geometry {
        Some(geometry) => geometry.clone(),
        None => geometry_from_bbox(&region.bbox),
    }
}

pub(super) fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

pub(super) fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

/// Sample standard deviation; 0.0 below two samples.
pub(super) fn sample_stdev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f32>()
        / (values.len() - 1) as f32;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32) -> NormPoint {
        NormPoint { x, y }
    }

    #[test]
    fn vertex_order_sorts_scrambled_quad() {
        let scrambled = vec![
            point(0.9, 0.4),
            point(0.1, 0.1),
            point(0.1, 0.4),
            point(0.9, 0.1),
        ];
        let quad = normalize_vertex_order(&scrambled).unwrap();
        assert_eq!(quad[0], point(0.1, 0.1));
        assert_eq!(quad[1], point(0.9, 0.1));
        assert_eq!(quad[2], point(0.9, 0.4));
        assert_eq!(quad[3], point(0.1, 0.4));
    }

    #[test]
    fn vertex_order_is_idempotent() {
        let tilted = vec![
            point(0.2, 0.12),
            point(0.8, 0.2),
            point(0.78, 0.35),
            point(0.18, 0.27),
        ];
        let once = normalize_vertex_order(&tilted).unwrap();
        let twice = normalize_vertex_order(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn vertex_order_rejects_non_quads() {
        assert!(normalize_vertex_order(&[]).is_none());
        assert!(normalize_vertex_order(&[point(0.1, 0.1), point(0.2, 0.2)]).is_none());
        let five = vec![
            point(0.0, 0.0),
            point(1.0, 0.0),
            point(1.0, 1.0),
            point(0.0, 1.0),
            point(0.5, 0.5),
        ];
        assert!(normalize_vertex_order(&five).is_none());
    }

    #[test]
    fn aspect_ratio_guards_zero_height() {
        let flat = BBoxNorm {
            x1: 0.1,
            y1: 0.5,
            x2: 0.6,
            y2: 0.5,
        };
        assert_eq!(aspect_ratio(&flat), 1.0);
        let wide = BBoxNorm {
            x1: 0.0,
            y1: 0.0,
            x2: 0.8,
            y2: 0.2,
        };
        assert!((aspect_ratio(&wide) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn angle_of_axis_aligned_quad_is_zero() {
        let bbox = BBoxNorm {
            x1: 0.1,
            y1: 0.7,
            x2: 0.9,
            y2: 0.8,
        };
        assert_eq!(angle_degrees(&quad_from_bbox(&bbox)), 0.0);
    }

    #[test]
    fn angle_follows_top_edge_slope() {
        let quad = [
            point(0.0, 0.0),
            point(0.5, 0.5),
            point(0.4, 0.9),
            point(-0.1, 0.4),
        ];
        assert!((angle_degrees(&quad) - 45.0).abs() < 1e-3);
    }

    #[test]
    fn overlap_ratio_uses_wider_box() {
        let a = BBoxNorm {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 0.1,
        };
        let b = BBoxNorm {
            x1: 0.0,
            y1: 0.0,
            x2: 0.5,
            y2: 0.1,
        };
        assert!((horizontal_overlap_ratio(&a, &b) - 0.5).abs() < 1e-6);
        let apart = BBoxNorm {
            x1: 0.6,
            y1: 0.0,
            x2: 0.9,
            y2: 0.1,
        };
        assert_eq!(horizontal_overlap_ratio(&b, &apart), 0.0);
    }

    #[test]
    fn bbox_fallback_geometry_is_axis_aligned() {
        let bbox = BBoxNorm {
            x1: 0.2,
            y1: 0.3,
            x2: 0.6,
            y2: 0.5,
        };
        let geometry = geometry_from_bbox(&bbox);
        assert_eq!(geometry.angle_deg, 0.0);
        assert_eq!(geometry.quad[0], point(0.2, 0.3));
        assert_eq!(geometry.quad[2], point(0.6, 0.5));
        assert_eq!(geometry.center, point(0.4, 0.4));
    }

    #[test]
    fn median_averages_even_counts() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn sample_stdev_needs_two_values() {
        assert_eq!(sample_stdev(&[5.0]), 0.0);
        let spread = sample_stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((spread - 2.138).abs() < 1e-3);
    }
}
