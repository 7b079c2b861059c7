//! Per-image detection record as published by the record store.
//!
//! Geometry in every detection list is expressed in the `width × height` space of the
//! record, never in screen pixels. Confidence fields are fractions in `0..=1`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Axis-aligned face box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxDetection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "prob", alias = "probability")]
    pub probability: f64,
}

/// Object box with a class name (`inst` and `lvic` categories).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabeledBoxDetection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "prob", alias = "probability")]
    pub probability: f64,
    #[serde(rename = "class", alias = "class_name", default)]
    pub class_name: String,
}

/// One pose joint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointDetection {
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// A bone between two joints; each endpoint keeps its own score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkDetection {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub score0: f64,
    pub score1: f64,
}

/// Share of the image covered by one panoptic class.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentStat {
    #[serde(default)]
    pub class_name: String,
    #[serde(rename = "value", alias = "percent_value")]
    pub percent_value: f64,
    #[serde(rename = "color", alias = "color_hex", default)]
    pub color_hex: String,
}

/// Pointer to another record, shown as a clickable thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub thumbnail_url: String,
}

/// Everything the viewer knows about one image.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RecordFile")]
pub struct DetectionRecord {
    pub image_url: String,
    pub width: f64,
    pub height: f64,
    pub title: String,
    pub date: String,
    pub collection_id: String,
    pub source_url: String,
    pub filename: String,
    pub faces: Vec<BoxDetection>,
    pub objects: Vec<LabeledBoxDetection>,
    pub lvis_objects: Vec<LabeledBoxDetection>,
    pub keypoints: Vec<PointDetection>,
    pub keypoint_links: Vec<LinkDetection>,
    pub segments: Vec<SegmentStat>,
    pub neighbors: Vec<Recommendation>,
    pub random_recs: Vec<Recommendation>,
}

impl DetectionRecord {
    /// Decode a record from the JSON published by the record store.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

// On-disk layout. A list that is missing or `null` decodes as empty.
#[derive(Debug, Default, Deserialize)]
struct RecordFile {
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    sort_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    collection: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    filename: String,
    #[serde(default, deserialize_with = "nullable_list")]
    face: Vec<BoxDetection>,
    #[serde(default, deserialize_with = "nullable_list")]
    inst: Vec<LabeledBoxDetection>,
    #[serde(default, deserialize_with = "nullable_list")]
    lvic: Vec<LabeledBoxDetection>,
    #[serde(default, deserialize_with = "nullable_list")]
    kpnt: Vec<PointDetection>,
    #[serde(default, deserialize_with = "nullable_list")]
    kcnt: Vec<LinkDetection>,
    #[serde(default, deserialize_with = "nullable_list")]
    pano: Vec<SegmentStat>,
    #[serde(default, deserialize_with = "nullable_list")]
    nn: Vec<Value>,
    #[serde(default, deserialize_with = "nullable_list")]
    nn_thumb: Vec<Value>,
    #[serde(default, deserialize_with = "nullable_list")]
    rr: Vec<Value>,
    #[serde(default, deserialize_with = "nullable_list")]
    rr_thumb: Vec<Value>,
}

impl From<RecordFile> for DetectionRecord {
    fn from(file: RecordFile) -> Self {
        Self {
            image_url: file.image_url,
            width: file.width,
            height: file.height,
            title: file.title,
            date: file.sort_date,
            collection_id: file.collection,
            source_url: file.url,
            filename: file.filename,
            faces: file.face,
            objects: file.inst,
            lvis_objects: file.lvic,
            keypoints: file.kpnt,
            keypoint_links: file.kcnt,
            segments: file.pano,
            neighbors: zip_recommendations(&file.nn, &file.nn_thumb),
            random_recs: zip_recommendations(&file.rr, &file.rr_thumb),
        }
    }
}

fn zip_recommendations(ids: &[Value], thumbs: &[Value]) -> Vec<Recommendation> {
    ids.iter()
        .zip(thumbs)
        .filter_map(|(id, thumb)| {
            Some(Recommendation {
                id: scalar_to_string(id)?,
                thumbnail_url: scalar_to_string(thumb)?,
            })
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value).unwrap_or_default())
}

fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_original_key_names() {
        let raw = json!({
            "image_url": "img/2017877547.jpg",
            "width": 640,
            "height": 480,
            "title": "Street scene",
            "sort_date": "1910",
            "collection": "ggbain",
            "url": "https://www.loc.gov/item/2017877547/",
            "filename": "2017877547",
            "face": [{"x": 10, "y": 10, "width": 5, "height": 5, "prob": 0.9}],
            "inst": [{"x": 1, "y": 2, "width": 3, "height": 4, "prob": 0.7, "class": "person"}],
            "lvic": [],
            "kpnt": [{"x": 1, "y": 1, "score": 0.6}],
            "kcnt": [{"x0": 1, "y0": 1, "x1": 2, "y1": 2, "score0": 0.6, "score1": 0.4}],
            "pano": [{"class_name": "sky", "value": 12.4, "color": "#fabd2f"}],
            "nn": ["a", "b"],
            "nn_thumb": ["a.jpg", "b.jpg"],
            "rr": [2017877000u64],
            "rr_thumb": ["r.jpg"]
        })
        .to_string();

        let record = DetectionRecord::from_json(&raw).unwrap();
        assert_eq!(record.date, "1910");
        assert_eq!(record.collection_id, "ggbain");
        assert_eq!(record.faces[0].probability, 0.9);
        assert_eq!(record.objects[0].class_name, "person");
        assert_eq!(record.keypoint_links[0].score1, 0.4);
        assert_eq!(record.segments[0].color_hex, "#fabd2f");
        assert_eq!(record.neighbors.len(), 2);
        assert_eq!(record.neighbors[1].thumbnail_url, "b.jpg");
        assert_eq!(record.random_recs[0].id, "2017877000");
    }

    #[test]
    fn missing_lists_decode_empty() {
        let raw = r#"{"image_url": "x.jpg", "width": 10, "height": 10}"#;
        let record = DetectionRecord::from_json(raw).unwrap();
        assert!(record.faces.is_empty());
        assert!(record.keypoint_links.is_empty());
        assert!(record.neighbors.is_empty());
        assert!(record.title.is_empty());
    }

    #[test]
    fn null_lists_decode_empty() {
        let raw = json!({
            "image_url": "x.jpg",
            "width": 10,
            "height": 10,
            "face": [{"x": 1, "y": 1, "width": 2, "height": 2, "prob": 0.9}],
            "inst": null,
            "lvic": null,
            "kpnt": null,
            "kcnt": null,
            "pano": null,
            "nn": null,
            "nn_thumb": ["a.jpg"],
            "rr": null,
            "rr_thumb": null
        })
        .to_string();
        let record = DetectionRecord::from_json(&raw).unwrap();
        assert_eq!(record.faces.len(), 1);
        assert!(record.objects.is_empty());
        assert!(record.lvis_objects.is_empty());
        assert!(record.keypoints.is_empty());
        assert!(record.keypoint_links.is_empty());
        assert!(record.segments.is_empty());
        assert!(record.neighbors.is_empty());
        assert!(record.random_recs.is_empty());
    }

    #[test]
    fn uneven_recommendation_arrays_truncate() {
        let raw = r#"{"nn": ["a", "b", "c"], "nn_thumb": ["a.jpg"]}"#;
        let record = DetectionRecord::from_json(raw).unwrap();
        assert_eq!(
            record.neighbors,
            vec![Recommendation {
                id: "a".to_string(),
                thumbnail_url: "a.jpg".to_string()
            }]
        );
    }
}
