//! SVG builder: accumulates SVG elements and produces the final string.
//!
//! Also produces the standalone overlay fragments (boxes and labels) that
//! are appended to rendered score pages.

use super::constants::*;
use super::layout::{Label, Rect};
use crate::document::escape_into;

// ═══════════════════════════════════════════════════════════════════════
// SvgBuilder
// ═══════════════════════════════════════════════════════════════════════

pub(crate) struct SvgBuilder {
    pub(crate) elements: Vec<String>,
    width: f64,
    height: f64,
}

impl SvgBuilder {
    pub(crate) fn new(width: f64, height: f64) -> Self {
        Self {
            elements: Vec::new(),
            width,
            height,
        }
    }

    pub(crate) fn build(self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}" style="font-family: 'Helvetica', 'Arial', sans-serif;">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        for el in &self.elements {
            svg.push_str("  ");
            svg.push_str(el);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }

    pub(crate) fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: &str, width: f64) {
        self.elements.push(format!(
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="{:.1}"/>"#,
            x1, y1, x2, y2, color, width
        ));
    }

    pub(crate) fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, stroke: &str, stroke_width: f64) {
        if stroke_width > 0.0 {
            self.elements.push(format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" stroke="{}" stroke-width="{:.1}"/>"#,
                x, y, w, h, fill, stroke, stroke_width
            ));
        } else {
            self.elements.push(format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
                x, y, w, h, fill
            ));
        }
    }

    pub(crate) fn text(&mut self, x: f64, y: f64, content: &str, size: f64, weight: &str, fill: &str, anchor: &str) {
        self.elements.push(text_element(x, y, content, size, weight, fill, anchor));
    }
}

fn text_element(x: f64, y: f64, content: &str, size: f64, weight: &str, fill: &str, anchor: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    escape_into(&mut escaped, content, false);
    format!(
        r#"<text x="{:.1}" y="{:.1}" font-size="{:.0}" font-weight="{}" fill="{}" text-anchor="{}">{}</text>"#,
        x, y, size, weight, fill, anchor, escaped
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Page overlay fragments
// ═══════════════════════════════════════════════════════════════════════

/// Outline rectangle drawn around a pattern span.
pub(crate) fn box_outline(rect: &Rect, stroke: &str, stroke_width: f64) -> String {
    format!(
        r#"<rect fill="{}" height="{:.0}" stroke="{}" width="{:.0}" x="{:.0}" y="{:.0}" stroke-width="{:.0}"/>"#,
        BOX_FILL, rect.height, stroke, rect.width, rect.x, rect.y, stroke_width
    )
}

/// Text label placed under a span box.
pub(crate) fn box_label(label: &Label, content: &str, fill: &str, size: f64) -> String {
    text_element(label.x, label.y, content, size, LABEL_FONT_WEIGHT, fill, LABEL_ANCHOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_svg_wraps_elements() {
        let mut svg = SvgBuilder::new(200.0, 100.0);
        svg.rect(0.0, 0.0, 10.0, 10.0, "#ff0000", "none", 0.0);
        svg.text(5.0, 5.0, "a<b", 12.0, "normal", "black", "middle");
        let out = svg.build();
        assert!(out.starts_with("<svg"));
        assert!(out.contains(r##"fill="#ff0000""##));
        assert!(out.contains("a&lt;b"));
        assert!(out.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn overlay_fragments_are_standalone_elements() {
        let rect = Rect { x: 10.0, y: 20.0, width: 300.0, height: 500.0 };
        let frag = box_outline(&rect, "green", 50.0);
        assert!(roxmltree::Document::parse(&frag).is_ok());
        assert!(frag.contains(r#"width="300""#));

        let label = box_label(&Label { x: 410.0, y: 2408.0 }, "intersect Pat-1 & Pat-2", "green", 150.0);
        let doc = roxmltree::Document::parse(&label).unwrap();
        assert_eq!(doc.root_element().text(), Some("intersect Pat-1 & Pat-2"));
    }
}
