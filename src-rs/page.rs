//! Standalone HTML page for one ready view.

use std::fmt::Write;

use crate::category::Category;
use crate::nav::Location;
use crate::overlay::render;
use crate::panel::{segment_bars, ArchivalPanel};
use crate::record::DetectionRecord;
use crate::select::select;
use crate::strip::{Gallery, RecommendationStrip};
use crate::svg::escape_xml as esc;
use crate::view::ViewControls;

const STYLE: &str = "body{font-family:sans-serif;background:#282828;color:#ebdbb2;margin:0}\
.wrapper{display:flex;flex-wrap:wrap;gap:1em;padding:1em}\
.ibox{flex:2 1 480px}.ibox svg{width:100%;height:auto}\
.tbox{flex:1 1 320px}\
a{color:#83a598}\
.anno{display:inline-block;padding:2px 6px;margin:2px;border:1px solid #928374}\
.anno-active{background:#d79921;color:#282828}\
.pano-bar{position:relative;height:1.4em;margin:2px 0;background:#3c3836}\
.pano-fill{height:100%}\
.pano-text{position:absolute;left:4px;top:0}\
.thumbs{display:flex;flex-wrap:wrap;gap:4px}.thumbs img{height:96px}";

/// Page showing `record` under `controls`, with thumbnails that link back through `location`.
pub fn render_page(record: &DetectionRecord, controls: ViewControls, location: &Location) -> String {
    let primitives = select(record, controls.category, controls.confidence_pct);
    let composite = render(
        &record.image_url,
        record.width,
        record.height,
        controls.opacity_pct,
        primitives,
    );
    let panel = ArchivalPanel::from_record(record);
    let strip = RecommendationStrip::build(record, location);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", esc(&panel.title));
    let _ = writeln!(out, "<style>{STYLE}</style>\n</head>\n<body>\n<div class=\"wrapper\">");

    out.push_str("<div class=\"ibox\">\n");
    out.push_str(&composite.to_svg());
    out.push_str("</div>\n<div class=\"tbox\">\n");

    out.push_str("<h3>Archival data</h3>\n");
    let _ = writeln!(out, "<p><b>Title:</b> {}</p>", esc(&panel.title));
    let _ = writeln!(out, "<p><b>Date:</b> {}</p>", esc(&panel.date));
    let _ = writeln!(
        out,
        "<p><b>Collection:</b> <a href=\"{}\">{}</a></p>",
        esc(panel.collection_link),
        esc(panel.collection_name)
    );
    let _ = writeln!(
        out,
        "<p><b>Library of Congress:</b> <a href=\"{}\">{}</a></p>",
        esc(&panel.source_url),
        esc(&panel.filename)
    );

    out.push_str("<h3>Computer vision annotations</h3>\n");
    let _ = writeln!(
        out,
        "<p>Opacity: {}% &middot; Confidence: {}%</p>",
        controls.opacity_pct, controls.confidence_pct
    );
    out.push_str("<p>");
    for category in Category::ALL {
        let class = if category == controls.category {
            "anno anno-active"
        } else {
            "anno"
        };
        let _ = write!(
            out,
            "<span class=\"{class}\" title=\"{}\">{}</span>",
            esc(category.description()),
            category.caption()
        );
    }
    out.push_str("</p>\n");

    out.push_str("<h4>Panoptic segmentation</h4>\n");
    for bar in segment_bars(record) {
        let _ = writeln!(
            out,
            "<div class=\"pano-bar\"><div class=\"pano-fill\" style=\"width:{}%;background-color:{}\"></div><span class=\"pano-text\">{}</span></div>",
            bar.width_pct,
            esc(&bar.color),
            esc(&bar.caption)
        );
    }

    write_gallery(&mut out, &strip.similar);
    write_gallery(&mut out, &strip.other);

    out.push_str("</div>\n</div>\n</body>\n</html>\n");
    out
}

fn write_gallery(out: &mut String, gallery: &Gallery) {
    let _ = writeln!(
        out,
        "<h4 title=\"{}\">{}</h4>\n<div class=\"thumbs\">",
        esc(gallery.tooltip),
        esc(gallery.title)
    );
    for thumb in &gallery.thumbnails {
        let _ = writeln!(
            out,
            "<a href=\"{}\"><img src=\"{}\" alt=\"nav\"></a>",
            esc(&thumb.href),
            esc(&thumb.thumbnail_url)
        );
    }
    out.push_str("</div>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LabeledBoxDetection, Recommendation, SegmentStat};

    #[test]
    fn page_carries_overlay_panel_and_links() {
        let record = DetectionRecord {
            image_url: "img/1.jpg".to_string(),
            width: 100.0,
            height: 80.0,
            title: "Crowd <outside>".to_string(),
            collection_id: "fsac".to_string(),
            objects: vec![LabeledBoxDetection {
                x: 5.0,
                y: 6.0,
                width: 7.0,
                height: 8.0,
                probability: 0.99,
                class_name: "person".to_string(),
            }],
            segments: vec![SegmentStat {
                class_name: "sky".to_string(),
                percent_value: 40.2,
                color_hex: "#fabd2f".to_string(),
            }],
            neighbors: vec![Recommendation {
                id: "2".to_string(),
                thumbnail_url: "t/2.jpg".to_string(),
            }],
            ..Default::default()
        };
        let controls = ViewControls::default().with_category(Category::Inst);
        let location = Location::parse("http://localhost/?id=1").unwrap();
        let html = render_page(&record, controls, &location);

        assert!(html.contains("Crowd &lt;outside&gt;"));
        assert!(html.contains("FSA-OWI Color Images"));
        assert!(html.contains(">person</text>"));
        assert!(html.contains("sky (40%)"));
        assert!(html.contains(r#"<a href="?id=2"><img src="t/2.jpg""#));
        assert!(html.contains(r#"class="anno anno-active" title="Draw boxes around detected objects and people.">Objects"#));
    }
}
