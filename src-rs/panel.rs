//! Side panel content: archival metadata and panoptic segmentation bars.

use serde::Serialize;

use crate::record::{DetectionRecord, SegmentStat};

const FSAC_NAME: &str = "FSA-OWI Color Images";
const FSAC_LINK: &str = "https://www.loc.gov/pictures/collection/fsac/";
const GGBAIN_NAME: &str = "George Grantham Bain Collection";
const GGBAIN_LINK: &str = "https://www.loc.gov/pictures/collection/ggbain/";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivalPanel {
    pub title: String,
    pub date: String,
    pub collection_name: &'static str,
    pub collection_link: &'static str,
    pub source_url: String,
    pub filename: String,
}

impl ArchivalPanel {
    pub fn from_record(record: &DetectionRecord) -> Self {
        let (collection_name, collection_link) = collection_display(&record.collection_id);
        Self {
            title: record.title.clone(),
            date: record.date.clone(),
            collection_name,
            collection_link,
            source_url: record.source_url.clone(),
            filename: record.filename.clone(),
        }
    }
}

/// Display name and catalogue link for a collection key.
pub fn collection_display(collection_id: &str) -> (&'static str, &'static str) {
    if collection_id == "fsac" {
        (FSAC_NAME, FSAC_LINK)
    } else {
        (GGBAIN_NAME, GGBAIN_LINK)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentBar {
    pub caption: String,
    pub width_pct: f64,
    pub color: String,
}

impl SegmentBar {
    pub fn from_stat(stat: &SegmentStat) -> Self {
        let value = if stat.percent_value.is_finite() {
            stat.percent_value
        } else {
            0.0
        };
        Self {
            caption: format!("{} ({}%)", stat.class_name, value.round()),
            width_pct: value.clamp(0.0, 100.0),
            color: stat.color_hex.clone(),
        }
    }
}

/// One bar per segmentation class, in record order. Segments are never filtered.
pub fn segment_bars(record: &DetectionRecord) -> Vec<SegmentBar> {
    record.segments.iter().map(SegmentBar::from_stat).collect()
}
