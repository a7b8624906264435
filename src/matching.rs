//! Pattern matching: classifies how two annotators' spans relate and
//! builds the persisted match relation per (song, annotator pair).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{self, PatternError, Result};
use crate::model::{AnnotatorId, MatchKind, MatchRecord, PatternInstance, SongId};
use crate::table::AnnotationTable;

// ═══════════════════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════════════════

/// Classify the relation between two ordered note-id spans.
///
/// Returns `None` when the spans share no identifier. When one span is fully
/// inside the other it is a containment, unless the container's first or
/// last note is shared, in which case the pair is an `Intersect`. Partial
/// overlap on both sides is always an `Intersect`.
pub fn classify(ids_a: &[String], ids_b: &[String]) -> Option<MatchKind> {
    if ids_a.is_empty() || ids_b.is_empty() {
        return None;
    }
    let set_a: HashSet<&str> = ids_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = ids_b.iter().map(String::as_str).collect();

    let mask_a: Vec<bool> = ids_a.iter().map(|n| set_b.contains(n.as_str())).collect();
    let mask_b: Vec<bool> = ids_b.iter().map(|n| set_a.contains(n.as_str())).collect();

    if !mask_a.iter().any(|&m| m) {
        return None;
    }

    let touches_boundary = |mask: &[bool]| mask[0] || mask[mask.len() - 1];

    let kind = if mask_a.iter().all(|&m| m) {
        if touches_boundary(&mask_b) {
            MatchKind::Intersect
        } else {
            MatchKind::Contained1In2
        }
    } else if mask_b.iter().all(|&m| m) {
        if touches_boundary(&mask_a) {
            MatchKind::Intersect
        } else {
            MatchKind::Contained2In1
        }
    } else {
        MatchKind::Intersect
    };
    Some(kind)
}

/// Classify every (left, right) pair, in left-major order, keeping only
/// overlapping pairs.
pub fn build_matches(left: &[PatternInstance], right: &[PatternInstance]) -> Vec<MatchRecord> {
    let mut matches = Vec::new();
    for a in left {
        for b in right {
            if let Some(kind) = classify(&a.note_ids, &b.note_ids) {
                matches.push(MatchRecord {
                    left: a.to_ref(),
                    right: b.to_ref(),
                    kind,
                });
            }
        }
    }
    matches
}

// ═══════════════════════════════════════════════════════════════════════
// Persisted relation
// ═══════════════════════════════════════════════════════════════════════

/// The match relation of one song and one annotator pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSet {
    pub song_id: SongId,
    pub first: AnnotatorId,
    pub second: AnnotatorId,
    pub matches: Vec<MatchRecord>,
}

impl MatchSet {
    pub fn file_name(&self) -> String {
        relation_file_name(self.song_id, self.first, self.second)
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let json = serde_json::to_string(&self.matches)?;
        error::write_file(&path, json)?;
        Ok(path)
    }

    /// Read a relation file; song and annotators come from its name.
    pub fn read(path: &Path) -> Result<Self> {
        let (song_id, first, second) = parse_relation_file_name(path)?;
        let text = error::read_to_string(path)?;
        let matches: Vec<MatchRecord> = serde_json::from_str(&text)?;
        Ok(Self {
            song_id,
            first,
            second,
            matches,
        })
    }
}

pub fn relation_file_name(song_id: SongId, first: AnnotatorId, second: AnnotatorId) -> String {
    format!("{song_id}_{first}_{second}.json")
}

/// Split `"{song}_{user1}_{user2}.json"` into its three ids.
pub fn parse_relation_file_name(path: &Path) -> Result<(SongId, AnnotatorId, AnnotatorId)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PatternError::format(format!("bad relation file name '{}'", path.display())))?;
    let parts: Vec<&str> = stem.split('_').collect();
    let parse = |s: &str| {
        s.parse::<i64>().map_err(|_| {
            PatternError::format(format!(
                "relation file '{}' is not named song_user1_user2.json",
                path.display()
            ))
        })
    };
    match parts.as_slice() {
        [song, first, second] => Ok((parse(song)?, parse(first)?, parse(second)?)),
        _ => Err(PatternError::format(format!(
            "relation file '{}' is not named song_user1_user2.json",
            path.display()
        ))),
    }
}

/// Compute the relation for one song and one annotator pair.
pub fn analyse_pair(
    table: &AnnotationTable,
    song_id: SongId,
    first: AnnotatorId,
    second: AnnotatorId,
) -> MatchSet {
    let left = table.instances(song_id, first);
    let right = table.instances(song_id, second);
    MatchSet {
        song_id,
        first,
        second,
        matches: build_matches(&left, &right),
    }
}

/// Compute and persist the relation of every configured song and annotator
/// pair. Returns the written files.
#[tracing::instrument(skip_all)]
pub fn analyse_all(config: &Config, table: &AnnotationTable) -> Result<Vec<PathBuf>> {
    let dir = &config.paths.results_dir;
    std::fs::create_dir_all(dir).map_err(|e| PatternError::io(dir, e))?;

    let mut written = Vec::new();
    for (first, second) in config.annotator_pairs() {
        info!(first, second, "analysing annotator pair");
        for song_id in config.songs() {
            let set = analyse_pair(table, song_id, first, second);
            if set.matches.is_empty() {
                warn!(song_id, first, second, "no overlapping patterns");
            }
            match set.write(dir) {
                Ok(path) => written.push(path),
                Err(e) => warn!(song_id, first, second, error = %e, "relation not written"),
            }
        }
    }
    Ok(written)
}

/// All relation files in a folder, sorted by name.
pub fn relation_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PatternError::missing(format!(
            "results folder '{}' not found",
            dir.display()
        )));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| PatternError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| parse_relation_file_name(p).is_ok())
        .collect();
    files.sort();
    Ok(files)
}
