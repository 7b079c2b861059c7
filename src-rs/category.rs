use serde::{Deserialize, Serialize};
use std::fmt;

/// The single annotation layer currently shown over the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    None,
    Face,
    Inst,
    Lvic,
    Kpnt,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::None,
        Category::Face,
        Category::Inst,
        Category::Lvic,
        Category::Kpnt,
    ];

    /// Parse a category key. Anything unrecognised selects no overlay.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "face" => Category::Face,
            "inst" => Category::Inst,
            "lvic" => Category::Lvic,
            "kpnt" => Category::Kpnt,
            "none" => Category::None,
            other => {
                log::debug!("unknown annotation category '{other}', showing none");
                Category::None
            }
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::None => "none",
            Category::Face => "face",
            Category::Inst => "inst",
            Category::Lvic => "lvic",
            Category::Kpnt => "kpnt",
        }
    }

    /// Button caption used on the rendered page.
    pub fn caption(self) -> &'static str {
        match self {
            Category::None => "None",
            Category::Face => "Faces",
            Category::Inst => "Objects",
            Category::Lvic => "LVIS",
            Category::Kpnt => "Pose",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::None => "Clear annotations.",
            Category::Face => "Draw boxes around detected faces.",
            Category::Inst => "Draw boxes around detected objects and people.",
            Category::Lvic => {
                "Draw boxes around detected objects; uses a larger set of object types than the Objects annotations."
            }
            Category::Kpnt => "Show the limbs and body of detected people.",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
