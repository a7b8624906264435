//! Annotator agreement by position: Jaccard similarity of the measures where
//! each annotator starts a pattern.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{self, Result};
use crate::model::{AnnotatorId, SongId};
use crate::renderer::matrix::render_matrix;
use crate::table::AnnotationTable;

/// Positions of one annotator in one song.
pub type Positions = BTreeSet<i64>;

/// Widen every position to its neighborhood `m - radius ..= m + radius`.
/// Positions below 1 are dropped.
pub fn expand(positions: &Positions, radius: u32) -> Positions {
    let r = i64::from(radius);
    positions
        .iter()
        .flat_map(|&m| (m - r)..=(m + r))
        .filter(|&m| m > 0)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, 0 when both sets are empty.
pub fn jaccard(a: &Positions, b: &Positions) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Blue for no agreement, yellow for full agreement.
pub fn similarity_color(value: f64) -> Rgb {
    let v = value.clamp(0.0, 1.0);
    let warm = (255.0 * v).round() as u8;
    let cool = (255.0 * (1.0 - v)).round() as u8;
    Rgb(warm, warm, cool)
}

/// Start measures of every row an annotator left in a song.
pub fn start_positions(table: &AnnotationTable, song_id: SongId, annotator: AnnotatorId) -> Positions {
    table
        .song_rows(song_id)
        .filter(|(_, row)| row.user_id == annotator)
        .filter_map(|(_, row)| row.start_measure)
        .collect()
}

/// Pairwise similarity of all annotators for one song.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatrix {
    pub song_id: SongId,
    pub radius: u32,
    pub annotators: Vec<AnnotatorId>,
    /// `values[i][j]` compares `annotators[i]` with `annotators[j]`
    pub values: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    pub fn compute(table: &AnnotationTable, song_id: SongId, annotators: &[AnnotatorId], radius: u32) -> Self {
        let positions: Vec<Positions> = annotators
            .iter()
            .map(|&a| expand(&start_positions(table, song_id, a), radius))
            .collect();
        let values = positions
            .iter()
            .map(|a| positions.iter().map(|b| jaccard(a, b)).collect())
            .collect();
        Self {
            song_id,
            radius,
            annotators: annotators.to_vec(),
            values,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i)?.get(j).copied()
    }

    pub fn to_svg(&self) -> String {
        render_matrix(self)
    }
}

/// Score every configured song and write `{song}_similarity.json` and
/// `.svg` into the similarity folder. Returns the written files; a song
/// whose files cannot be written is skipped with a warning.
#[tracing::instrument(skip_all)]
pub fn score_all(config: &Config, table: &AnnotationTable) -> Result<Vec<PathBuf>> {
    let dir = &config.paths.similarity_dir;
    let mut written = Vec::new();
    for song_id in config.songs() {
        let matrix = SimilarityMatrix::compute(table, song_id, &config.annotators, config.similarity_radius);
        if matrix.values.iter().flatten().all(|&v| v == 0.0) {
            warn!(song_id, "no shared positions between annotators");
        }

        match write_matrix(dir, &matrix) {
            Ok(paths) => {
                info!(song_id, radius = config.similarity_radius, "similarity matrix written");
                written.extend(paths);
            }
            Err(e) => warn!(song_id, error = %e, "similarity matrix not written"),
        }
    }
    Ok(written)
}

fn write_matrix(dir: &Path, matrix: &SimilarityMatrix) -> Result<[PathBuf; 2]> {
    let song_id = matrix.song_id;
    let json_path = dir.join(format!("{song_id:03}_similarity.json"));
    error::write_file(&json_path, serde_json::to_string_pretty(matrix)?)?;
    let svg_path = dir.join(format!("{song_id:03}_similarity.svg"));
    error::write_file(&svg_path, matrix.to_svg())?;
    Ok([json_path, svg_path])
}
