//! Rendered page index: which notes a rendered page contains and where
//! their noteheads sit.

use std::collections::HashMap;

use roxmltree::Node;

use crate::document::{find_by_class, has_class, Markup, NOTEHEAD_CLASS, PAGE_MARGIN_CLASS};
use crate::error::Result;
use crate::model::Point;

/// One page of engraved score with its note groups indexed by id.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Name used for output files, e.g. `000_Bach_p1`
    pub stem: String,
    markup: Markup,
    notes: HashMap<String, Option<Point>>,
    has_margin: bool,
}

impl RenderedPage {
    pub fn from_svg(stem: impl Into<String>, svg: impl Into<String>) -> Result<Self> {
        let markup = Markup::new(svg);
        let (notes, has_margin) = {
            let doc = markup.parse()?;
            let notes = doc
                .descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "g")
                .filter_map(|n| n.attribute("id").map(|id| (id.to_string(), glyph_position(&n))))
                .collect();
            let has_margin = find_by_class(&doc, "g", PAGE_MARGIN_CLASS).is_some();
            (notes, has_margin)
        };
        Ok(Self {
            stem: stem.into(),
            markup,
            notes,
            has_margin,
        })
    }

    pub fn markup(&self) -> &Markup {
        &self.markup
    }

    /// Whether a group with this id is drawn on the page.
    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    /// Notehead position of a note drawn on the page.
    pub fn position(&self, id: &str) -> Option<Point> {
        self.notes.get(id).copied().flatten()
    }

    /// Whether overlays can be appended to this page.
    pub fn has_margin(&self) -> bool {
        self.has_margin
    }
}

/// Position of the glyph under a note group: the notehead's `use` element,
/// or the group's first `use` when it has no notehead.
fn glyph_position(group: &Node) -> Option<Point> {
    let head = group
        .descendants()
        .find(|n| n.is_element() && has_class(n, NOTEHEAD_CLASS));
    let glyph = head
        .and_then(|h| first_use(&h))
        .or_else(|| first_use(group))?;
    let x = glyph.attribute("x")?.trim().parse::<f64>().ok()?;
    let y = glyph.attribute("y")?.trim().parse::<f64>().ok()?;
    Some(Point::new(x, y))
}

fn first_use<'a, 'i>(node: &Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "use")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
  <g class="page-margin">
    <g id="n1" class="note"><g class="notehead"><use xlink:href="#E0A4" x="1200" y="2100"/></g></g>
    <g id="n2" class="note"><g class="stem"/><use xlink:href="#E0A3" x="1800" y="2150"/></g>
    <g id="n3" class="note"/>
  </g>
</svg>"##;

    #[test]
    fn indexes_notes_and_positions() {
        let page = RenderedPage::from_svg("000_test", PAGE).unwrap();
        assert!(page.has_margin());
        assert_eq!(page.position("n1"), Some(Point::new(1200.0, 2100.0)));
        assert_eq!(page.position("n2"), Some(Point::new(1800.0, 2150.0)));
        assert!(page.contains("n3"));
        assert_eq!(page.position("n3"), None);
        assert!(!page.contains("n4"));
    }
}
