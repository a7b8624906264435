//! Annotation table ingestion.
//!
//! Annotation exports are CSV files with one row per marked pattern. Rows
//! are kept in file order and a row's position among the file's records is
//! the pattern's id, also when earlier records were rejected.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{PatternError, Result};
use crate::model::{AnnotatorId, PatternInstance, SongId};
use crate::parser::extract_note_ids;

/// One row of an annotation export. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationRow {
    pub song_id: SongId,
    pub user_id: AnnotatorId,
    pub pattern_tag: String,
    /// Embedded score fragment covering the pattern's notes
    pub xml_file: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub start_measure: Option<i64>,
    #[serde(default)]
    pub pattern_rank: Option<String>,
    /// Record position in the file, counted from 0 after the header
    #[serde(skip)]
    pub index: usize,
}

/// All annotation rows of one export, in file order.
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    pub rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    /// Load an annotation CSV. A missing file is a [`PatternError::MissingInput`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PatternError::missing(format!(
                "annotation table '{}' not found",
                path.display()
            )));
        }
        let file = std::fs::File::open(path).map_err(|e| PatternError::io(path, e))?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), rows = table.rows.len(), "loaded annotation table");
        Ok(table)
    }

    /// Parse CSV text. A record that does not fit [`AnnotationRow`] is
    /// skipped with a warning; an unreadable header fails the whole table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        csv.headers()?;
        let mut rows = Vec::new();
        for (index, record) in csv.deserialize::<AnnotationRow>().enumerate() {
            match record {
                Ok(row) => rows.push(AnnotationRow { index, ..row }),
                Err(e) => {
                    let line = e.position().map(|p| p.line());
                    warn!(record = index, line, "skipping malformed annotation row: {e}");
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one song, paired with their record index.
    pub fn song_rows(&self, song_id: SongId) -> impl Iterator<Item = (usize, &AnnotationRow)> {
        self.rows
            .iter()
            .filter(move |r| r.song_id == song_id)
            .map(|r| (r.index, r))
    }

    /// Distinct annotators in first-appearance order.
    pub fn annotators(&self) -> Vec<AnnotatorId> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.user_id) {
                seen.push(row.user_id);
            }
        }
        seen
    }

    /// Pattern instances of one annotator on one song, in row order.
    ///
    /// Rows whose fragment does not parse are skipped with a warning; rows
    /// whose fragment has no identified notes are dropped silently.
    pub fn instances(&self, song_id: SongId, owner: AnnotatorId) -> Vec<PatternInstance> {
        self.song_rows(song_id)
            .filter(|(_, r)| r.user_id == owner)
            .filter_map(|(idx, row)| instance_from_row(idx, row))
            .collect()
    }

    /// Pattern instances of every annotator on one song, in row order.
    pub fn song_instances(&self, song_id: SongId) -> Vec<PatternInstance> {
        self.song_rows(song_id)
            .filter_map(|(idx, row)| instance_from_row(idx, row))
            .collect()
    }
}

/// Build an instance from one row, or `None` when it carries no usable span.
pub fn instance_from_row(idx: usize, row: &AnnotationRow) -> Option<PatternInstance> {
    let note_ids = match extract_note_ids(&row.xml_file) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(
                row = idx,
                user = row.user_id,
                tag = %row.pattern_tag,
                "skipping row with unparseable fragment: {e}"
            );
            return None;
        }
    };
    if note_ids.is_empty() {
        debug!(row = idx, user = row.user_id, "dropping pattern without identified notes");
        return None;
    }
    Some(PatternInstance {
        id: idx,
        owner: row.user_id,
        song_id: row.song_id,
        tag: row.pattern_tag.clone(),
        note_ids,
        start_measure: row.start_measure,
        rank: row.pattern_rank.clone(),
    })
}
