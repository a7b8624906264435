//! Layer partitioning: splits one annotator's matched patterns into layers
//! whose members never share a note, so each layer can be drawn on its own
//! copy of the page.

use std::collections::HashSet;

use crate::model::{MatchRecord, PatternRef, Side};

/// A set of pairwise note-disjoint patterns rendered together.
pub type Layer = Vec<PatternRef>;

/// Strategy splitting patterns into note-disjoint layers.
pub trait PartitionStrategy {
    fn partition(&self, patterns: &[PatternRef]) -> Vec<Layer>;
}

/// Greedy first-fit, longest pattern first.
///
/// Produces a valid partition, not necessarily the one with the fewest
/// layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyFirstFit;

impl PartitionStrategy for GreedyFirstFit {
    fn partition(&self, patterns: &[PatternRef]) -> Vec<Layer> {
        let mut ordered: Vec<&PatternRef> = patterns.iter().collect();
        // stable: equal lengths keep input order
        ordered.sort_by(|a, b| b.note_ids.len().cmp(&a.note_ids.len()));

        let mut layers: Vec<Layer> = Vec::new();
        let mut occupied: Vec<HashSet<&str>> = Vec::new();

        for pattern in ordered {
            let slot = occupied
                .iter()
                .position(|notes| pattern.note_ids.iter().all(|n| !notes.contains(n.as_str())));
            let idx = match slot {
                Some(idx) => idx,
                None => {
                    layers.push(Vec::new());
                    occupied.push(HashSet::new());
                    layers.len() - 1
                }
            };
            occupied[idx].extend(pattern.note_ids.iter().map(String::as_str));
            layers[idx].push(pattern.clone());
        }
        layers
    }
}

/// One side's patterns of a relation, de-duplicated by id, in order of first
/// appearance.
pub fn collect_side(matches: &[MatchRecord], side: Side) -> Vec<PatternRef> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .map(|m| m.side(side))
        .filter(|p| seen.insert(p.id))
        .cloned()
        .collect()
}

/// True when no two patterns of the layer share a note.
pub fn is_note_disjoint(layer: &[PatternRef]) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    for pattern in layer {
        let own = pattern.note_set();
        if own.iter().any(|n| seen.contains(n)) {
            return false;
        }
        seen.extend(own);
    }
    true
}
