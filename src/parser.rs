//! Pattern fragment parser: extracts the ordered note identifiers a
//! pattern instance spans from its embedded MEI/MusicXML fragment.

use roxmltree::{Document, Node};

use crate::error::Result;

/// Namespace of the `xml:` attribute prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub(crate) fn parse_options() -> roxmltree::ParsingOptions {
    // Exported MusicXML carries a DOCTYPE declaration
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    }
}

/// Parse a score fragment and return the identifiers of its notes in
/// document order.
///
/// Every element whose local name is `note` counts, whatever its namespace.
/// The identifier is the note's `xml:id` (MEI); a plain `id` (MusicXML 4)
/// is accepted when `xml:id` is absent. Notes carrying neither are skipped.
///
/// # Errors
/// Returns an error when the fragment is not well-formed XML.
pub fn extract_note_ids(fragment: &str) -> Result<Vec<String>> {
    let doc = Document::parse_with_options(fragment.trim(), parse_options())?;
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "note")
        .filter_map(|n| note_id(&n).map(String::from))
        .collect())
}

/// The identifier declared by an element, `xml:id` first.
pub(crate) fn note_id<'a>(node: &Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XML_NS, "id"))
        .or_else(|| node.attribute("id"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mei_fragment_yields_ids_in_order() {
        let xml = r#"<section xmlns="http://www.music-encoding.org/ns/mei">
            <measure n="3"><staff><layer>
                <note xml:id="n-b" pname="c" oct="4"/>
                <rest xml:id="r1"/>
                <beam><note xml:id="n-a" pname="d" oct="4"/></beam>
                <note pname="e" oct="4"/>
            </layer></staff></measure>
        </section>"#;
        assert_eq!(extract_note_ids(xml).unwrap(), vec!["n-b", "n-a"]);
    }

    #[test]
    fn plain_id_is_a_fallback() {
        let xml = r#"<measure><note id="m1"/><note xml:id="m2" id="ignored"/></measure>"#;
        assert_eq!(extract_note_ids(xml).unwrap(), vec!["m1", "m2"]);
    }

    #[test]
    fn fragment_without_identified_notes_is_empty() {
        let xml = r#"<measure><note pname="c"/><rest/></measure>"#;
        assert!(extract_note_ids(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_fragment_is_an_error() {
        assert!(extract_note_ids("<measure><note xml:id='x'></measure>").is_err());
    }
}
