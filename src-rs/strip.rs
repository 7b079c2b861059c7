//! Related-image galleries shown under the viewer.

use serde::Serialize;

use crate::nav::Location;
use crate::record::{DetectionRecord, Recommendation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    pub id: String,
    pub thumbnail_url: String,
    /// Location that opens this record.
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gallery {
    pub title: &'static str,
    pub tooltip: &'static str,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationStrip {
    pub similar: Gallery,
    pub other: Gallery,
}

/// Which of the two galleries a thumbnail was picked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryKind {
    Similar,
    Other,
}

impl RecommendationStrip {
    pub fn build(record: &DetectionRecord, location: &Location) -> Self {
        Self {
            similar: Gallery {
                title: "Similar Photographs",
                tooltip: "Images that have some visual similarity to the starting image based on the image embedding method.",
                thumbnails: thumbnails(&record.neighbors, location),
            },
            other: Gallery {
                title: "Other Recommendations",
                tooltip: "Randomly selected images from the collection to show other possibilities.",
                thumbnails: thumbnails(&record.random_recs, location),
            },
        }
    }

    pub fn gallery(&self, kind: GalleryKind) -> &Gallery {
        match kind {
            GalleryKind::Similar => &self.similar,
            GalleryKind::Other => &self.other,
        }
    }

    pub fn pick(&self, kind: GalleryKind, index: usize) -> Option<&Thumbnail> {
        self.gallery(kind).thumbnails.get(index)
    }
}

fn thumbnails(recs: &[Recommendation], location: &Location) -> Vec<Thumbnail> {
    recs.iter()
        .map(|rec| Thumbnail {
            id: rec.id.clone(),
            thumbnail_url: rec.thumbnail_url.clone(),
            href: location.navigate_to(&rec.id).relative_href(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            thumbnail_url: format!("thumb/{id}.jpg"),
        }
    }

    #[test]
    fn keeps_every_entry_in_order() {
        let record = DetectionRecord {
            neighbors: vec![rec("b"), rec("a"), rec("b")],
            random_recs: vec![rec("z")],
            ..Default::default()
        };
        let location = Location::parse("http://localhost/?id=self").unwrap();
        let strip = RecommendationStrip::build(&record, &location);

        let ids: Vec<&str> = strip.similar.thumbnails.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "b"]);
        assert_eq!(strip.other.thumbnails[0].href, "?id=z");
        assert_eq!(
            strip.pick(GalleryKind::Similar, 1).map(|t| t.thumbnail_url.as_str()),
            Some("thumb/a.jpg")
        );
        assert!(strip.pick(GalleryKind::Other, 1).is_none());
    }
}
