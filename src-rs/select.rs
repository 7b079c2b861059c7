//! Annotation selection: one record, one category, one threshold in, drawable shapes out.
//!
//! Thresholds are percentages (`0..=100`) while detections carry fractional confidences;
//! an item is kept only when `100 * confidence` is strictly greater than the threshold.
//! Output order follows the source lists, so later shapes draw on top of earlier ones.

use serde::Serialize;

use crate::category::Category;
use crate::record::{DetectionRecord, LinkDetection, PointDetection};

/// Vertical distance between a box's top edge and its label baseline.
pub const LABEL_OFFSET: f64 = 5.0;
/// Radius of a keypoint marker, in record units.
pub const POINT_RADIUS: f64 = 5.0;

/// One drawable shape in record coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Primitive {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Label {
        x: f64,
        y: f64,
        text: String,
    },
    Point {
        cx: f64,
        cy: f64,
        radius: f64,
    },
    Line {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    },
}

/// `true` when a fractional confidence clears a percentage threshold.
pub fn passes(confidence: f64, threshold_pct: u8) -> bool {
    100.0 * confidence > f64::from(threshold_pct)
}

/// Shapes to draw for `category` at `threshold_pct`.
pub fn select(record: &DetectionRecord, category: Category, threshold_pct: u8) -> Vec<Primitive> {
    match category {
        Category::None => Vec::new(),
        Category::Face => {
            let boxes = record.faces.iter().map(|f| BoxItem {
                x: f.x,
                y: f.y,
                width: f.width,
                height: f.height,
                confidence: f.probability,
                label: None,
            });
            select_boxes(boxes, threshold_pct)
        }
        Category::Inst | Category::Lvic => {
            let source = if category == Category::Inst {
                &record.objects
            } else {
                &record.lvis_objects
            };
            let boxes = source.iter().map(|o| BoxItem {
                x: o.x,
                y: o.y,
                width: o.width,
                height: o.height,
                confidence: o.probability,
                label: Some(o.class_name.as_str()),
            });
            select_boxes(boxes, threshold_pct)
        }
        Category::Kpnt => {
            let mut out = select_points(&record.keypoints, threshold_pct);
            out.extend(select_links(&record.keypoint_links, threshold_pct));
            out
        }
    }
}

struct BoxItem<'a> {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f64,
    label: Option<&'a str>,
}

fn select_boxes<'a>(
    items: impl Iterator<Item = BoxItem<'a>>,
    threshold_pct: u8,
) -> Vec<Primitive> {
    let mut out = Vec::new();
    for item in items.filter(|b| passes(b.confidence, threshold_pct)) {
        out.push(Primitive::Rect {
            x: item.x,
            y: item.y,
            width: item.width,
            height: item.height,
        });
        if let Some(text) = item.label {
            out.push(Primitive::Label {
                x: item.x,
                y: item.y - LABEL_OFFSET,
                text: text.to_string(),
            });
        }
    }
    out
}

/// Joint markers for keypoints above the threshold.
pub fn select_points(points: &[PointDetection], threshold_pct: u8) -> Vec<Primitive> {
    points
        .iter()
        .filter(|p| passes(p.score, threshold_pct))
        .map(|p| Primitive::Point {
            cx: p.x,
            cy: p.y,
            radius: POINT_RADIUS,
        })
        .collect()
}

/// Bone segments whose two endpoints both clear the threshold.
pub fn select_links(links: &[LinkDetection], threshold_pct: u8) -> Vec<Primitive> {
    links
        .iter()
        .filter(|l| passes(l.score0, threshold_pct) && passes(l.score1, threshold_pct))
        .map(|l| Primitive::Line {
            x0: l.x0,
            y0: l.y0,
            x1: l.x1,
            y1: l.y1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BoxDetection, LabeledBoxDetection};

    fn face(probability: f64) -> BoxDetection {
        BoxDetection {
            x: 10.0,
            y: 10.0,
            width: 5.0,
            height: 5.0,
            probability,
        }
    }

    fn link(score0: f64, score1: f64) -> LinkDetection {
        LinkDetection {
            x0: 0.0,
            y0: 0.0,
            x1: 4.0,
            y1: 4.0,
            score0,
            score1,
        }
    }

    #[test]
    fn face_scenario_respects_threshold() {
        let record = DetectionRecord {
            faces: vec![face(0.9)],
            ..Default::default()
        };
        assert_eq!(
            select(&record, Category::Face, 50),
            vec![Primitive::Rect {
                x: 10.0,
                y: 10.0,
                width: 5.0,
                height: 5.0
            }]
        );
        assert!(select(&record, Category::Face, 95).is_empty());
    }

    #[test]
    fn boundary_value_is_excluded() {
        assert!(!passes(0.5, 50));
        assert!(passes(0.51, 50));
        assert!(!passes(0.0, 0));
        assert!(passes(0.01, 0));
        assert!(!passes(1.0, 100));

        let record = DetectionRecord {
            faces: vec![face(0.5)],
            ..Default::default()
        };
        assert!(select(&record, Category::Face, 50).is_empty());
        assert_eq!(select(&record, Category::Face, 49).len(), 1);
    }

    #[test]
    fn labeled_boxes_emit_rect_then_label_above() {
        let record = DetectionRecord {
            objects: vec![
                LabeledBoxDetection {
                    x: 20.0,
                    y: 30.0,
                    width: 8.0,
                    height: 9.0,
                    probability: 0.8,
                    class_name: "person".to_string(),
                },
                LabeledBoxDetection {
                    x: 1.0,
                    y: 1.0,
                    width: 1.0,
                    height: 1.0,
                    probability: 0.2,
                    class_name: "dog".to_string(),
                },
            ],
            ..Default::default()
        };
        let out = select(&record, Category::Inst, 50);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1],
            Primitive::Label {
                x: 20.0,
                y: 25.0,
                text: "person".to_string()
            }
        );
        assert!(select(&record, Category::Lvic, 50).is_empty());
    }

    #[test]
    fn lvic_reads_its_own_list() {
        let record = DetectionRecord {
            objects: vec![LabeledBoxDetection {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
                probability: 0.9,
                class_name: "person".to_string(),
            }],
            lvis_objects: vec![
                LabeledBoxDetection {
                    x: 40.0,
                    y: 50.0,
                    width: 6.0,
                    height: 7.0,
                    probability: 0.75,
                    class_name: "top_hat".to_string(),
                },
                LabeledBoxDetection {
                    x: 0.0,
                    y: 0.0,
                    width: 2.0,
                    height: 2.0,
                    probability: 0.6,
                    class_name: "umbrella".to_string(),
                },
            ],
            ..Default::default()
        };
        let out = select(&record, Category::Lvic, 70);
        assert_eq!(
            out,
            vec![
                Primitive::Rect {
                    x: 40.0,
                    y: 50.0,
                    width: 6.0,
                    height: 7.0,
                },
                Primitive::Label {
                    x: 40.0,
                    y: 45.0,
                    text: "top_hat".to_string()
                },
            ]
        );
        assert_eq!(select(&record, Category::Lvic, 50).len(), 4);
        assert_eq!(select(&record, Category::Inst, 50).len(), 2);
    }

    #[test]
    fn keypoint_scenario_drops_half_confident_link() {
        let record = DetectionRecord {
            keypoints: vec![PointDetection {
                x: 1.0,
                y: 1.0,
                score: 0.6,
            }],
            keypoint_links: vec![link(0.6, 0.4)],
            ..Default::default()
        };
        let out = select(&record, Category::Kpnt, 50);
        assert_eq!(
            out,
            vec![Primitive::Point {
                cx: 1.0,
                cy: 1.0,
                radius: POINT_RADIUS
            }]
        );
    }

    #[test]
    fn link_included_iff_both_endpoints_pass() {
        let scores = [0.0, 0.3, 0.5, 0.50001, 0.7, 1.0];
        for threshold in [0u8, 30, 50, 70, 100] {
            for &s0 in &scores {
                for &s1 in &scores {
                    let included = !select_links(&[link(s0, s1)], threshold).is_empty();
                    assert_eq!(
                        included,
                        passes(s0, threshold) && passes(s1, threshold),
                        "s0={s0} s1={s1} threshold={threshold}"
                    );
                }
            }
        }
    }

    #[test]
    fn none_is_always_empty() {
        let record = DetectionRecord {
            faces: vec![face(1.0)],
            keypoints: vec![PointDetection {
                x: 0.0,
                y: 0.0,
                score: 1.0,
            }],
            ..Default::default()
        };
        for threshold in [0u8, 50, 100] {
            assert!(select(&record, Category::None, threshold).is_empty());
        }
    }

    #[test]
    fn selection_is_repeatable_and_ordered() {
        let record = DetectionRecord {
            faces: vec![face(0.9), face(0.1), face(0.7)],
            keypoints: vec![
                PointDetection {
                    x: 3.0,
                    y: 3.0,
                    score: 0.9,
                },
                PointDetection {
                    x: 1.0,
                    y: 1.0,
                    score: 0.9,
                },
            ],
            keypoint_links: vec![link(0.9, 0.9)],
            ..Default::default()
        };
        for category in Category::ALL {
            assert_eq!(
                select(&record, category, 40),
                select(&record, category, 40)
            );
        }
        let kpnt = select(&record, Category::Kpnt, 40);
        assert!(matches!(kpnt[0], Primitive::Point { cx, .. } if cx == 3.0));
        assert!(matches!(kpnt[1], Primitive::Point { cx, .. } if cx == 1.0));
        assert!(matches!(kpnt[2], Primitive::Line { .. }));
    }
}
