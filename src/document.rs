//! Markup documents: read-only parsing plus a one-pass rewrite that applies
//! a list of style patches and appends overlay elements.
//!
//! Pages are never mutated in place. Callers collect every change for one
//! output variant into a [`DocumentEdit`] and [`Markup::rewrite`] emits a
//! fresh serialization of the original source with the edit applied.

use std::collections::HashMap;

use roxmltree::{Document, Node, NodeType};

use crate::error::{PatternError, Result};
use crate::parser::{note_id, parse_options};

/// Class of the notehead group nested in a rendered note.
pub const NOTEHEAD_CLASS: &str = "notehead";
/// Class of the page group overlays are appended to.
pub const PAGE_MARGIN_CLASS: &str = "page-margin";

/// Attribute changes for one identified element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    /// `id` or `xml:id` of the element
    pub target: String,
    /// Attributes set on the element itself
    pub attrs: Vec<(String, String)>,
    /// Attributes set on its `notehead` descendants
    pub notehead: Vec<(String, String)>,
}

impl StylePatch {
    /// Color a rendered note: `color` on the note group, `fill` on its notehead.
    pub fn note_color(target: impl Into<String>, color: impl Into<String>) -> Self {
        let color = color.into();
        Self {
            target: target.into(),
            attrs: vec![("color".into(), color.clone())],
            notehead: vec![("fill".into(), color)],
        }
    }

    /// Set a single attribute on the element.
    pub fn attribute(target: impl Into<String>, name: &str, value: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attrs: vec![(name.to_string(), value.into())],
            notehead: Vec::new(),
        }
    }
}

/// Everything that changes in one output variant of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentEdit {
    /// Applied in order; a later patch wins on the same attribute
    pub patches: Vec<StylePatch>,
    /// Serialized elements appended inside the page-margin group
    pub appended: Vec<String>,
}

impl DocumentEdit {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.appended.is_empty()
    }
}

/// A markup source kept as text; parsed on demand.
#[derive(Debug, Clone)]
pub struct Markup {
    source: String,
}

impl Markup {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parse(&self) -> Result<Document<'_>> {
        Ok(Document::parse_with_options(&self.source, parse_options())?)
    }

    /// Serialize the document with `edit` applied.
    ///
    /// # Errors
    /// Fails when the source does not parse, or when the edit appends
    /// elements and the document has no page-margin group.
    pub fn rewrite(&self, edit: &DocumentEdit) -> Result<String> {
        let doc = self.parse()?;
        let merged = merge_patches(&edit.patches);

        let anchor = if edit.appended.is_empty() {
            None
        } else {
            let node = find_by_class(&doc, "g", PAGE_MARGIN_CLASS)
                .ok_or_else(|| PatternError::format("document has no page-margin group"))?;
            Some(node.id())
        };

        let writer = Writer {
            patches: &merged,
            anchor,
            appended: &edit.appended,
        };
        let mut out = String::with_capacity(self.source.len() + edit.appended.len() * 128);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        for child in doc.root().children() {
            writer.node(&mut out, child, &[]);
        }
        out.push('\n');
        Ok(out)
    }
}

/// Element carrying `id` (or `xml:id`) equal to `id`.
pub(crate) fn find_by_id<'a, 'i>(doc: &'a Document<'i>, id: &str) -> Option<Node<'a, 'i>> {
    doc.descendants()
        .find(|n| n.is_element() && note_id(n) == Some(id))
}

/// First element named `tag` whose class list contains `class`.
pub fn find_by_class<'a, 'i>(doc: &'a Document<'i>, tag: &str, class: &str) -> Option<Node<'a, 'i>> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag && has_class(n, class))
}

pub fn has_class(node: &Node, class: &str) -> bool {
    node.attribute("class")
        .is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

// ═══════════════════════════════════════════════════════════════════════
// Serialization
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MergedPatch {
    attrs: Vec<(String, String)>,
    notehead: Vec<(String, String)>,
}

fn upsert(list: &mut Vec<(String, String)>, name: &str, value: &str) {
    match list.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => list.push((name.to_string(), value.to_string())),
    }
}

fn merge_patches(patches: &[StylePatch]) -> HashMap<&str, MergedPatch> {
    let mut merged: HashMap<&str, MergedPatch> = HashMap::new();
    for patch in patches {
        let entry = merged.entry(patch.target.as_str()).or_default();
        for (name, value) in &patch.attrs {
            upsert(&mut entry.attrs, name, value);
        }
        for (name, value) in &patch.notehead {
            upsert(&mut entry.notehead, name, value);
        }
    }
    merged
}

struct Writer<'e> {
    patches: &'e HashMap<&'e str, MergedPatch>,
    anchor: Option<roxmltree::NodeId>,
    appended: &'e [String],
}

impl Writer<'_> {
    /// `inherited` carries notehead attributes of an enclosing patched note.
    fn node(&self, out: &mut String, node: Node, inherited: &[(String, String)]) {
        match node.node_type() {
            NodeType::Element => self.element(out, node, inherited),
            NodeType::Text => escape_into(out, node.text().unwrap_or(""), false),
            NodeType::Comment => {
                out.push_str("<!--");
                out.push_str(node.text().unwrap_or(""));
                out.push_str("-->");
            }
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    out.push_str("<?");
                    out.push_str(pi.target);
                    if let Some(value) = pi.value {
                        out.push(' ');
                        out.push_str(value);
                    }
                    out.push_str("?>");
                }
            }
            NodeType::Root => {}
        }
    }

    fn element(&self, out: &mut String, node: Node, inherited: &[(String, String)]) {
        let name = qualified_name(&node, node.tag_name().namespace(), node.tag_name().name());
        out.push('<');
        out.push_str(&name);

        write_namespace_decls(out, &node);

        let patch = note_id(&node).and_then(|id| self.patches.get(id));
        let mut overrides: Vec<(String, String)> = Vec::new();
        if let Some(p) = patch {
            overrides.extend(p.attrs.iter().cloned());
        }
        if !inherited.is_empty() && has_class(&node, NOTEHEAD_CLASS) {
            for (n, v) in inherited {
                upsert(&mut overrides, n, v);
            }
        }

        for attr in node.attributes() {
            let attr_name = qualified_name(&node, attr.namespace(), attr.name());
            let value = match overrides.iter().position(|(n, _)| *n == attr_name) {
                Some(idx) => overrides.remove(idx).1,
                None => attr.value().to_string(),
            };
            write_attr(out, &attr_name, &value);
        }
        for (n, v) in &overrides {
            write_attr(out, n, v);
        }

        let is_anchor = self.anchor == Some(node.id());
        if !node.has_children() && !is_anchor {
            out.push_str("/>");
            return;
        }
        out.push('>');

        let nested: &[(String, String)] = match patch {
            Some(p) if !p.notehead.is_empty() => &p.notehead,
            _ => inherited,
        };
        for child in node.children() {
            self.node(out, child, nested);
        }
        if is_anchor {
            for fragment in self.appended {
                out.push_str(fragment);
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn qualified_name(node: &Node, namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Declare the namespaces that come into scope at this element.
fn write_namespace_decls(out: &mut String, node: &Node) {
    let parent = node.parent_element();
    for ns in node.namespaces() {
        if ns.name() == Some("xml") {
            continue;
        }
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
        });
        if inherited {
            continue;
        }
        match ns.name() {
            Some(prefix) => write_attr(out, &format!("xmlns:{prefix}"), ns.uri()),
            None => write_attr(out, "xmlns", ns.uri()),
        }
    }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

pub(crate) fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="100">
  <!-- engraved -->
  <g class="page-margin" transform="translate(500, 500)">
    <g id="n1" class="note"><g class="notehead"><use xlink:href="#E0A4" x="10" y="20"/></g></g>
    <g id="n2" class="note" color="black"><g class="notehead" fill="black"><use xlink:href="#E0A4" x="30" y="20"/></g></g>
    <text x="1">a &amp; b</text>
  </g>
</svg>"##;

    #[test]
    fn rewrite_without_edits_round_trips_structure() {
        let markup = Markup::new(PAGE);
        let out = markup.rewrite(&DocumentEdit::default()).unwrap();
        let doc = Document::parse(&out).unwrap();
        assert!(find_by_id(&doc, "n1").is_some());
        assert!(out.contains("xmlns:xlink=\"http://www.w3.org/1999/xlink\""));
        assert!(out.contains("xlink:href=\"#E0A4\""));
        assert!(out.contains("a &amp; b"));
        assert!(out.contains("<!-- engraved -->"));
    }

    #[test]
    fn note_patch_sets_color_and_notehead_fill() {
        let markup = Markup::new(PAGE);
        let edit = DocumentEdit {
            patches: vec![
                StylePatch::note_color("n2", "red"),
                StylePatch::note_color("n2", "green"),
                StylePatch::note_color("missing", "blue"),
            ],
            appended: vec![],
        };
        let out = markup.rewrite(&edit).unwrap();
        let doc = Document::parse(&out).unwrap();
        let note = find_by_id(&doc, "n2").unwrap();
        assert_eq!(note.attribute("color"), Some("green"), "later patch wins");
        let head = note.descendants().find(|n| has_class(n, NOTEHEAD_CLASS)).unwrap();
        assert_eq!(head.attribute("fill"), Some("green"));

        let untouched = find_by_id(&doc, "n1").unwrap();
        assert_eq!(untouched.attribute("color"), None);
    }

    #[test]
    fn appended_elements_land_in_page_margin() {
        let markup = Markup::new(PAGE);
        let edit = DocumentEdit {
            patches: vec![],
            appended: vec![r#"<rect x="1" y="2" width="3" height="4"/>"#.into()],
        };
        let out = markup.rewrite(&edit).unwrap();
        let doc = Document::parse(&out).unwrap();
        let margin = find_by_class(&doc, "g", PAGE_MARGIN_CLASS).unwrap();
        let last = margin.children().filter(|n| n.is_element()).last().unwrap();
        assert_eq!(last.tag_name().name(), "rect");
    }

    #[test]
    fn appending_without_anchor_fails() {
        let markup = Markup::new(r#"<svg xmlns="http://www.w3.org/2000/svg"><g/></svg>"#);
        let edit = DocumentEdit {
            patches: vec![],
            appended: vec!["<rect/>".into()],
        };
        assert!(markup.rewrite(&edit).is_err());
    }

    #[test]
    fn xml_id_targets_are_patched() {
        let mei = r#"<mei xmlns="http://www.music-encoding.org/ns/mei"><note xml:id="a1" pname="c"/></mei>"#;
        let out = Markup::new(mei)
            .rewrite(&DocumentEdit {
                patches: vec![StylePatch::attribute("a1", "color", "#E63946")],
                appended: vec![],
            })
            .unwrap();
        assert!(out.contains(r##"<note xml:id="a1" pname="c" color="#E63946"/>"##));
    }
}
