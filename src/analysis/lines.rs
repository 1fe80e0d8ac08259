use std::cmp::Ordering;

use super::geom::{self, points_bbox};
use super::{LineRegion, NormPoint, OcrWord, RegionGeometry, TextRole};

/// Top-edge gap that starts a new paragraph, as a fraction of image height.
const PARAGRAPH_GAP_FRAC: f32 = 0.05;
/// Words this far off the median paragraph angle are ignored for the
/// dominant-angle estimate.
const ANGLE_OUTLIER_DEG: f32 = 45.0;
/// Line-join tolerance as a fraction of the median word height.
const LINE_JOIN_HEIGHT_FRAC: f32 = 0.6;

/// Rebuilds text lines from loose OCR words. Words are grouped into
/// paragraphs by vertical proximity, de-rotated around each paragraph's
/// dominant angle, clustered into lines, and emitted top-to-bottom,
/// left-to-right with role `OTHER`.
pub fn reconstruct_lines(words: &[OcrWord]) -> Vec<LineRegion> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&OcrWord> = words.iter().collect();
    sorted.sort_by(|a, b| {
        let ka = (a.geometry.bbox.y1, a.geometry.bbox.x1);
        let kb = (b.geometry.bbox.y1, b.geometry.bbox.x1);
        ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
    });

    let mut lines: Vec<LineRegion> = Vec::new();
    let mut paragraph: Vec<&OcrWord> = Vec::new();
    for word in sorted {
        if let Some(previous) = paragraph.last() {
            let gap = word.geometry.bbox.y1 - previous.geometry.bbox.y1;
            if gap > PARAGRAPH_GAP_FRAC {
                lines.extend(reconstruct_paragraph(&paragraph));
                paragraph.clear();
            }
        }
        paragraph.push(word);
    }
    if !paragraph.is_empty() {
        lines.extend(reconstruct_paragraph(&paragraph));
    }

    lines.sort_by(|a, b| {
        (a.bbox.y1, a.bbox.x1)
            .partial_cmp(&(b.bbox.y1, b.bbox.x1))
            .unwrap_or(Ordering::Equal)
    });
    lines
}

fn reconstruct_paragraph(words: &[&OcrWord]) -> Vec<LineRegion> {
    if words.is_empty() {
        return Vec::new();
    }

    let angle = dominant_angle(words);
    let theta = angle.to_radians();

    let centroid_x = words.iter().map(|word| word.geometry.center.x).sum::<f32>() / words.len() as f32;
    let centroid_y = words.iter().map(|word| word.geometry.center.y).sum::<f32>() / words.len() as f32;

    // Rotating centers by -angle puts words of one tilted line at the
    // same rotated y.
    let mut order: Vec<(usize, f32)> = words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let dx = word.geometry.center.x - centroid_x;
            let dy = word.geometry.center.y - centroid_y;
            (index, dy * theta.cos() - dx * theta.sin())
        })
        .collect();
    order.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let heights: Vec<f32> = words.iter().map(|word| word.height).collect();
    let tolerance = LINE_JOIN_HEIGHT_FRAC * geom::median(&heights).unwrap_or(0.0);

    struct Row {
        indices: Vec<usize>,
        rotated_y_sum: f32,
    }

    let mut rows: Vec<Row> = Vec::new();
    for (index, rotated_y) in order {
        let joined = rows.iter_mut().find(|row| {
            let mean = row.rotated_y_sum / row.indices.len() as f32;
            (rotated_y - mean).abs() <= tolerance
        });
        match joined {
            Some(row) => {
                row.indices.push(index);
                row.rotated_y_sum += rotated_y;
            }
            None => rows.push(Row {
                indices: vec![index],
                rotated_y_sum: rotated_y,
            }),
        }
    }

    let mut lines = Vec::new();
    for row in rows {
        let mut members: Vec<&OcrWord> = row.indices.iter().map(|&index| words[index]).collect();
        members.sort_by(|a, b| {
            a.geometry
                .bbox
                .x1
                .partial_cmp(&b.geometry.bbox.x1)
                .unwrap_or(Ordering::Equal)
        });

        let text = members
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut vertices: Vec<NormPoint> = Vec::with_capacity(members.len() * 4);
        for word in &members {
            vertices.extend_from_slice(&word.geometry.quad);
        }
        let bbox = points_bbox(&vertices).unwrap_or_else(|| {
            let mut envelope = members[0].geometry.bbox;
            for word in &members[1..] {
                envelope = geom::union_bbox(&envelope, &word.geometry.bbox);
            }
            envelope
        });

        lines.push(LineRegion {
            text,
            bbox,
            role: TextRole::Other,
            geometry: Some(RegionGeometry {
                quad: geom::quad_from_bbox(&bbox),
                bbox,
                center: bbox.center(),
                angle_deg: angle,
            }),
        });
    }
    lines
}

/// Median word angle with outliers beyond 45 degrees dropped; falls back
/// to the unfiltered median when everything is an outlier.
fn dominant_angle(words: &[&OcrWord]) -> f32 {
    let angles: Vec<f32> = words.iter().map(|word| word.geometry.angle_deg).collect();
    let first_pass = match geom::median(&angles) {
        Some(value) => value,
        None => return 0.0,
    };
    let kept: Vec<f32> = angles
        .iter()
        .copied()
        .filter(|angle| (angle - first_pass).abs() <= ANGLE_OUTLIER_DEG)
        .collect();
    geom::median(&kept).unwrap_or(first_pass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::geometry_from_quad;

    fn word(text: &str, cx: f32, cy: f32, width: f32, height: f32, angle_deg: f32) -> OcrWord {
        let theta = angle_deg.to_radians();
        let (hw, hh) = (width / 2.0, height / 2.0);
        let corners = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)];
        let quad = corners.map(|(dx, dy)| NormPoint {
            x: cx + dx * theta.cos() - dy * theta.sin(),
            y: cy + dx * theta.sin() + dy * theta.cos(),
        });
        let geometry = geometry_from_quad(quad);
        OcrWord {
            text: text.to_string(),
            height: geometry.bbox.height(),
            geometry,
        }
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(reconstruct_lines(&[]).is_empty());
    }

    #[test]
    fn single_word_becomes_single_line() {
        let words = vec![word("ALONE", 0.5, 0.5, 0.1, 0.03, 0.0)];
        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ALONE");
        assert_eq!(lines[0].role, TextRole::Other);
        let geometry = lines[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.angle_deg, 0.0);
    }

    #[test]
    fn words_on_one_row_join_left_to_right() {
        // Out of reading order on purpose; x sort restores it.
        let words = vec![
            word("WORLD", 0.40, 0.30, 0.10, 0.03, 0.0),
            word("HELLO", 0.25, 0.301, 0.10, 0.03, 0.0),
        ];
        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "HELLO WORLD");
    }

    #[test]
    fn distinct_rows_stay_separate_and_sorted() {
        let words = vec![
            word("second", 0.3, 0.44, 0.1, 0.02, 0.0),
            word("first", 0.3, 0.40, 0.1, 0.02, 0.0),
            word("row", 0.42, 0.40, 0.08, 0.02, 0.0),
        ];
        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "first row");
        assert_eq!(lines[1].text, "second");
        assert!(lines[0].bbox.y1 < lines[1].bbox.y1);
    }

    #[test]
    fn close_centers_never_split_within_a_paragraph() {
        // Centers differ by less than 0.6 x median height.
        let words = vec![
            word("left", 0.20, 0.500, 0.08, 0.030, 0.0),
            word("right", 0.32, 0.512, 0.08, 0.030, 0.0),
        ];
        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "left right");
    }

    #[test]
    fn output_is_sorted_by_top_edge_then_x() {
        let words = vec![
            word("c", 0.5, 0.80, 0.06, 0.02, 0.0),
            word("a", 0.2, 0.10, 0.06, 0.02, 0.0),
            word("b", 0.6, 0.10, 0.06, 0.02, 0.0),
        ];
        let lines = reconstruct_lines(&words);
        let keys: Vec<(f32, f32)> = lines.iter().map(|line| (line.bbox.y1, line.bbox.x1)).collect();
        let mut expected = keys.clone();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(keys, expected);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "a b");
    }

    #[test]
    fn tilted_row_joins_despite_raw_y_spread() {
        // 30 degree baseline: raw center-y steps (0.0231) exceed the join
        // tolerance, so only derotation can keep these on one line.
        let angle = 30.0f32;
        let step = 0.04f32;
        let rise = step * angle.to_radians().tan();
        let words = vec![
            word("one", 0.30, 0.500, 0.03, 0.012, angle),
            word("two", 0.30 + step, 0.500 + rise, 0.03, 0.012, angle),
            word("three", 0.30 + 2.0 * step, 0.500 + 2.0 * rise, 0.03, 0.012, angle),
        ];
        let tolerance = LINE_JOIN_HEIGHT_FRAC * words[0].height;
        assert!(rise > tolerance, "fixture must defeat naive y grouping");

        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "one two three");
        let geometry = lines[0].geometry.as_ref().unwrap();
        assert!((geometry.angle_deg - angle).abs() < 0.5);
    }

    #[test]
    fn far_apart_rows_split_into_paragraphs() {
        // 0.07 top-edge gap exceeds the 5% paragraph threshold.
        let words = vec![
            word("top", 0.5, 0.10, 0.1, 0.02, 0.0),
            word("bottom", 0.5, 0.17, 0.1, 0.02, 0.0),
        ];
        let lines = reconstruct_lines(&words);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn dominant_angle_ignores_outliers() {
        let words = vec![
            word("a", 0.20, 0.50, 0.03, 0.012, 2.0),
            word("b", 0.26, 0.50, 0.03, 0.012, 3.0),
            word("c", 0.32, 0.50, 0.03, 0.012, 88.0),
        ];
        let refs: Vec<&OcrWord> = words.iter().collect();
        let angle = dominant_angle(&refs);
        assert!((angle - 2.5).abs() < 0.1);
    }
}
