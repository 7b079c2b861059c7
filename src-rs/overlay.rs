//! Overlay composition: base image, dimming scrim, then annotation shapes.
//!
//! A [`Composite`] is backend-neutral. [`Composite::to_svg`] serialises it for pages and
//! [`crate::raster::rasterize`] paints it into pixels.

use serde::Serialize;

use crate::select::Primitive;

/// Fixed drawing style shared by every backend.
pub struct Style;

impl Style {
    pub const HIGHLIGHT: [u8; 4] = [0xd7, 0x99, 0x21, 0xff];
    pub const HIGHLIGHT_HEX: &'static str = "#d79921";
    pub const FRAME: [u8; 4] = [0x92, 0x83, 0x74, 0xff];
    pub const FRAME_HEX: &'static str = "#928374";
    pub const SCRIM: [u8; 3] = [0, 0, 0];
    pub const BOX_STROKE: f64 = 4.0;
    pub const FRAME_STROKE: f64 = 4.0;
    pub const LINK_STROKE: f64 = 1.0;
    pub const LABEL_PX: f64 = 18.0;
}

/// One fully-specified overlay, layers in drawing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composite {
    pub image_url: String,
    pub width: f64,
    pub height: f64,
    /// Opacity of the black layer between image and shapes, `0..=100`.
    pub scrim_opacity_pct: u8,
    pub primitives: Vec<Primitive>,
}

/// Stack `primitives` over the image at `image_url`, dimmed according to `opacity_pct`.
///
/// `opacity_pct` is the visibility of the photograph: 100 leaves it untouched and 0 hides
/// it behind an opaque black scrim. Values above 100 are clamped.
pub fn render(
    image_url: &str,
    width: f64,
    height: f64,
    opacity_pct: u8,
    primitives: Vec<Primitive>,
) -> Composite {
    Composite {
        image_url: image_url.to_string(),
        width,
        height,
        scrim_opacity_pct: scrim_opacity(opacity_pct),
        primitives,
    }
}

pub fn scrim_opacity(opacity_pct: u8) -> u8 {
    100 - opacity_pct.min(100)
}

impl Composite {
    /// Scrim alpha on a 0..=255 scale.
    pub fn scrim_alpha(&self) -> u8 {
        (f64::from(self.scrim_opacity_pct.min(100)) * 2.55).round() as u8
    }

    /// Canvas size in whole pixels, at least 1×1.
    pub fn canvas_size(&self) -> (u32, u32) {
        let w = self.width.round().max(1.0) as u32;
        let h = self.height.round().max(1.0) as u32;
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrim_is_complement_of_opacity() {
        for opacity in 0..=100u8 {
            let composite = render("a.jpg", 10.0, 10.0, opacity, Vec::new());
            assert_eq!(composite.scrim_opacity_pct, 100 - opacity);
        }
        assert_eq!(render("a.jpg", 1.0, 1.0, 100, Vec::new()).scrim_alpha(), 0);
        assert_eq!(render("a.jpg", 1.0, 1.0, 0, Vec::new()).scrim_alpha(), 255);
    }

    #[test]
    fn opacity_above_range_clamps() {
        assert_eq!(scrim_opacity(250), 0);
    }

    #[test]
    fn canvas_never_collapses() {
        let composite = render("a.jpg", 0.0, 12.6, 80, Vec::new());
        assert_eq!(composite.canvas_size(), (1, 13));
    }
}
