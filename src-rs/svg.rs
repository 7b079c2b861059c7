use std::fmt::Write;

use crate::overlay::{Composite, Style};
use crate::select::Primitive;

/// Escape text for use in XML/HTML content and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

impl Composite {
    /// SVG document whose viewBox is the record coordinate space, so the overlay scales
    /// with whatever box the document is laid out in.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let hl = Style::HIGHLIGHT_HEX;
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
            self.width, self.height
        );
        let _ = writeln!(
            out,
            r#"  <image x="0" y="0" width="100%" height="100%" preserveAspectRatio="none" href="{}"/>"#,
            escape_xml(&self.image_url)
        );
        let _ = writeln!(
            out,
            r#"  <rect x="0" y="0" width="100%" height="100%" fill="black" opacity="{}%" stroke="{}" stroke-width="{}"/>"#,
            self.scrim_opacity_pct,
            Style::FRAME_HEX,
            Style::FRAME_STROKE
        );
        for primitive in &self.primitives {
            let _ = match primitive {
                Primitive::Rect {
                    x,
                    y,
                    width,
                    height,
                } => writeln!(
                    out,
                    r#"  <rect x="{x}" y="{y}" width="{width}" height="{height}" stroke="{hl}" stroke-width="{}" fill="none"/>"#,
                    Style::BOX_STROKE
                ),
                Primitive::Label { x, y, text } => writeln!(
                    out,
                    r#"  <text x="{x}" y="{y}" style="font: {}px sans-serif; fill: {hl}">{}</text>"#,
                    Style::LABEL_PX,
                    escape_xml(text)
                ),
                Primitive::Point { cx, cy, radius } => writeln!(
                    out,
                    r#"  <circle cx="{cx}" cy="{cy}" r="{radius}" fill="{hl}"/>"#
                ),
                Primitive::Line { x0, y0, x1, y1 } => writeln!(
                    out,
                    r#"  <line x1="{x0}" y1="{y0}" x2="{x1}" y2="{y1}" stroke="{hl}" stroke-width="{}"/>"#,
                    Style::LINK_STROKE
                ),
            };
        }
        out.push_str("</svg>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::render;

    #[test]
    fn layers_appear_in_stacking_order() {
        let composite = render(
            "img/a.jpg",
            640.0,
            480.0,
            80,
            vec![
                Primitive::Rect {
                    x: 1.0,
                    y: 2.0,
                    width: 3.0,
                    height: 4.0,
                },
                Primitive::Label {
                    x: 1.0,
                    y: -3.0,
                    text: "cat & dog".to_string(),
                },
            ],
        );
        let svg = composite.to_svg();
        let image_at = svg.find("<image").unwrap();
        let scrim_at = svg.find(r#"fill="black" opacity="20%""#).unwrap();
        let rect_at = svg.find(r#"<rect x="1" y="2""#).unwrap();
        assert!(image_at < scrim_at && scrim_at < rect_at);
        assert!(svg.contains(r#"viewBox="0 0 640 480""#));
        assert!(svg.contains(">cat &amp; dog</text>"));
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml(r#"<a href="x">'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&lt;/a&gt;");
    }
}
