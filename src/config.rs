//! Run configuration.
//!
//! Every tunable of the batch jobs lives in one immutable [`Config`] value
//! that is loaded once (defaults, optionally overridden by a JSON file) and
//! passed by reference into each component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};
use crate::model::{AnnotatorId, SongId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Annotators compared pairwise, in pair-generation order
    pub annotators: Vec<AnnotatorId>,
    /// First song index processed
    pub first_song: SongId,
    /// Number of consecutive songs processed
    pub song_count: SongId,
    pub paths: Paths,
    pub geometry: Geometry,
    pub palette: Palette,
    /// Seed for cosmetic jitter of overlay boxes; `None` disables jitter
    pub jitter_seed: Option<u64>,
    /// Neighborhood radius applied before Jaccard scoring (0 = exact)
    pub similarity_radius: u32,
    /// Number of standardized tags in the top-N chart
    pub chart_top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            annotators: vec![36, 46, 48, 49, 51],
            first_song: 0,
            song_count: 22,
            paths: Paths::default(),
            geometry: Geometry::default(),
            palette: Palette::default(),
            jitter_seed: None,
            similarity_radius: 0,
            chart_top_n: 20,
        }
    }
}

impl Config {
    /// Load a configuration file; fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = error::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn songs(&self) -> impl Iterator<Item = SongId> {
        self.first_song..self.first_song + self.song_count.max(0)
    }

    /// Unordered annotator pairs `(a[i], a[j])` with `i < j`.
    pub fn annotator_pairs(&self) -> Vec<(AnnotatorId, AnnotatorId)> {
        let users = &self.annotators;
        let mut pairs = Vec::new();
        for i in 0..users.len() {
            for j in i + 1..users.len() {
                pairs.push((users[i], users[j]));
            }
        }
        pairs
    }
}

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Annotation CSV (all annotators in one table)
    pub annotations: PathBuf,
    /// Folder of pre-rendered score pages (`NNN_*.svg`)
    pub pages_dir: PathBuf,
    /// Folder of full score sources (`NNN_*.mei`, `.xml`, `.mxl`)
    pub scores_dir: PathBuf,
    /// Folder receiving persisted match relations
    pub results_dir: PathBuf,
    /// Folder receiving annotated page variants
    pub output_dir: PathBuf,
    /// Folder receiving similarity matrices
    pub similarity_dir: PathBuf,
    /// Zip archive receiving chart specifications
    pub charts_bundle: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            annotations: PathBuf::from("PatternVsi (standardized).csv"),
            pages_dir: PathBuf::from("output_svgs_mei"),
            scores_dir: PathBuf::from("Song_Excel_Files"),
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("visualization_results"),
            similarity_dir: PathBuf::from("similarity"),
            charts_bundle: PathBuf::from("all_charts_high_quality.zip"),
        }
    }
}

/// Page-space constants used by the box/label placer (rendered SVG units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub min_width: f64,
    pub min_height: f64,
    pub min_text_width: f64,
    pub min_text_height: f64,
    /// Top of the first system band
    pub system_start: f64,
    /// Height of one system band
    pub system_height: f64,
    /// Text baseline of the first system band
    pub textline_start: f64,
    /// Minimum gap between a box bottom and its label
    pub label_gap: f64,
    /// Horizontal offset of a label from its box
    pub label_indent: f64,
    /// Boxes taller than this are split
    pub tall_threshold: f64,
    /// Split boxes taller than this get full-width fillers
    pub filler_threshold: f64,
    pub filler_step: f64,
    /// Right edge of the notation area
    pub content_right: f64,
    /// Right end of boxes that run off the end of a system
    pub page_right: f64,
    /// Left page edge; its magnitude is the page margin
    pub page_left: f64,
    pub full_width: f64,
    /// Space left of the start note inside a box
    pub start_pad_x: f64,
    /// Space above the start note inside a box
    pub start_pad_y: f64,
    pub box_extra_width: f64,
    pub box_extra_height: f64,
    /// Vertical distance under which two notes count as the same row
    pub row_tolerance: f64,
    pub box_stroke_width: f64,
    pub label_font_size: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            min_width: 100.0,
            min_height: 500.0,
            min_text_width: 1500.0,
            min_text_height: 600.0,
            system_start: 1025.0,
            system_height: 2255.0,
            textline_start: 2408.0,
            label_gap: 200.0,
            label_indent: 400.0,
            tall_threshold: 1700.0,
            filler_threshold: 4000.0,
            filler_step: 1300.0,
            content_right: 20000.0,
            page_right: 20300.0,
            page_left: -300.0,
            full_width: 20600.0,
            start_pad_x: 50.0,
            start_pad_y: 100.0,
            box_extra_width: 200.0,
            box_extra_height: 100.0,
            row_tolerance: 1000.0,
            box_stroke_width: 50.0,
            label_font_size: 150.0,
        }
    }
}

/// Colors used by the overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Notes only the first annotator marked
    pub first_only: String,
    /// Notes only the second annotator marked
    pub second_only: String,
    /// Shared notes of an `intersect` match
    pub intersect: String,
    /// Shared notes of a containment match
    pub contained: String,
    /// Label color of match annotations
    pub label: String,
    /// Cycled per distinct tag in tag overlays
    pub tags: Vec<String>,
    /// Fixed tag colors used when coloring a full score source
    pub score_tags: BTreeMap<String, String>,
}

impl Default for Palette {
    fn default() -> Self {
        let tags = [
            "#ff0000", "#00ff00", "#0000ff", "#800080", "#008000", "#800000", "#000080", "#008080",
            "#800000", "#2596be", "#FF9333", "#FF33AB", "#BB33FF", "#2CE1A5", "#CDD136", "#D1AF36",
            "#D18136",
        ];
        let score_tags = [
            ("Pat-1", "#E63946"),
            ("Pat-1.1", "#A8DADC"),
            ("Pat-1.2", "#457B9D"),
            ("Pat-2", "#1D3557"),
            ("Pat-3", "#E76F51"),
        ];
        Self {
            first_only: "red".into(),
            second_only: "blue".into(),
            intersect: "green".into(),
            contained: "violet".into(),
            label: "black".into(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            score_tags: score_tags
                .iter()
                .map(|(t, c)| (t.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl Palette {
    /// Tag color by first-appearance index, cycling through the palette.
    pub fn tag_color(&self, index: usize) -> &str {
        if self.tags.is_empty() {
            return "#000000";
        }
        &self.tags[index % self.tags.len()]
    }
}
