//! Data model for annotated pattern instances and the matches between them.
//!
//! Pattern instances are built from annotation rows; match records are the
//! persisted relation between two annotators' instances on one song.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotator (user) identifier as it appears in the annotation tables.
pub type AnnotatorId = i64;

/// Song index; score files are keyed by its 3-digit zero-padded form.
pub type SongId = i64;

/// One annotator's marking of a pattern on a score.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternInstance {
    /// Row index within the loaded annotation table
    pub id: usize,
    /// Annotator who marked the pattern
    pub owner: AnnotatorId,
    /// Song the pattern belongs to
    pub song_id: SongId,
    /// Category label, e.g. "Pat-1.2"
    pub tag: String,
    /// Ordered note identifiers; first and last are the span boundary
    pub note_ids: Vec<String>,
    /// Measure number where the pattern starts, when annotated
    pub start_measure: Option<i64>,
    /// Free-form rank column, shown in tag overlays
    pub rank: Option<String>,
}

impl PatternInstance {
    /// The `(note_ids, tag, id)` triple stored in match relations.
    pub fn to_ref(&self) -> PatternRef {
        PatternRef {
            note_ids: self.note_ids.clone(),
            tag: self.tag.clone(),
            id: self.id,
        }
    }

    pub fn first_note(&self) -> Option<&str> {
        self.note_ids.first().map(String::as_str)
    }

    pub fn last_note(&self) -> Option<&str> {
        self.note_ids.last().map(String::as_str)
    }
}

/// Identifies a pattern instance inside a persisted match relation.
///
/// Serialized as the 3-element array `[note_ids, tag, id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Vec<String>, String, usize)", into = "(Vec<String>, String, usize)")]
pub struct PatternRef {
    pub note_ids: Vec<String>,
    pub tag: String,
    pub id: usize,
}

impl PatternRef {
    pub fn first_note(&self) -> Option<&str> {
        self.note_ids.first().map(String::as_str)
    }

    pub fn last_note(&self) -> Option<&str> {
        self.note_ids.last().map(String::as_str)
    }

    pub fn contains_note(&self, note_id: &str) -> bool {
        self.note_ids.iter().any(|n| n == note_id)
    }

    pub fn note_set(&self) -> HashSet<&str> {
        self.note_ids.iter().map(String::as_str).collect()
    }
}

impl From<(Vec<String>, String, usize)> for PatternRef {
    fn from((note_ids, tag, id): (Vec<String>, String, usize)) -> Self {
        Self { note_ids, tag, id }
    }
}

impl From<PatternRef> for (Vec<String>, String, usize) {
    fn from(p: PatternRef) -> Self {
        (p.note_ids, p.tag, p.id)
    }
}

/// How two overlapping pattern spans relate. Disjoint pairs have no kind;
/// they are simply absent from a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Partial overlap, or containment that touches the container's boundary
    Intersect,
    /// The left span lies strictly inside the right one
    Contained1In2,
    /// The right span lies strictly inside the left one
    Contained2In1,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Intersect => "intersect",
            MatchKind::Contained1In2 => "contained1in2",
            MatchKind::Contained2In1 => "contained2in1",
        }
    }

    pub fn is_containment(self) -> bool {
        !matches!(self, MatchKind::Intersect)
    }

    /// The kind seen from the other side of the pair.
    pub fn swapped(self) -> Self {
        match self {
            MatchKind::Intersect => MatchKind::Intersect,
            MatchKind::Contained1In2 => MatchKind::Contained2In1,
            MatchKind::Contained2In1 => MatchKind::Contained1In2,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a persisted match relation, serialized as `[left, right, kind]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(PatternRef, PatternRef, MatchKind)",
    into = "(PatternRef, PatternRef, MatchKind)"
)]
pub struct MatchRecord {
    pub left: PatternRef,
    pub right: PatternRef,
    pub kind: MatchKind,
}

impl From<(PatternRef, PatternRef, MatchKind)> for MatchRecord {
    fn from((left, right, kind): (PatternRef, PatternRef, MatchKind)) -> Self {
        Self { left, right, kind }
    }
}

impl From<MatchRecord> for (PatternRef, PatternRef, MatchKind) {
    fn from(m: MatchRecord) -> Self {
        (m.left, m.right, m.kind)
    }
}

/// Which annotator of a pair a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl MatchRecord {
    pub fn side(&self, side: Side) -> &PatternRef {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Pixel position of a rendered note (the notehead glyph anchor).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pref(ids: &[&str], tag: &str, id: usize) -> PatternRef {
        PatternRef {
            note_ids: ids.iter().map(|s| s.to_string()).collect(),
            tag: tag.into(),
            id,
        }
    }

    #[test]
    fn match_record_serializes_as_nested_arrays() {
        let record = MatchRecord {
            left: pref(&["n1", "n2"], "Pat-1", 3),
            right: pref(&["n2"], "Pat-1.1", 7),
            kind: MatchKind::Contained2In1,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"[[["n1","n2"],"Pat-1",3],[["n2"],"Pat-1.1",7],"contained2in1"]"#);

        let back: MatchRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn swapped_kind_mirrors_containment() {
        assert_eq!(MatchKind::Contained1In2.swapped(), MatchKind::Contained2In1);
        assert_eq!(MatchKind::Contained2In1.swapped(), MatchKind::Contained1In2);
        assert_eq!(MatchKind::Intersect.swapped(), MatchKind::Intersect);
    }

    #[test]
    fn kind_names_match_wire_format() {
        for kind in [MatchKind::Intersect, MatchKind::Contained1In2, MatchKind::Contained2In1] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
