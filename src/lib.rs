//! patternlib: agreement analysis for melodic pattern annotations.
//!
//! Several annotators mark recurring patterns in the same scores. Each mark
//! is a row of an annotation table carrying the score fragment it covers.
//! This crate compares the marks of annotator pairs, draws the agreement on
//! engraved score pages, scores positional similarity and summarizes tag use.
//!
//! # Example
//! ```no_run
//! use patternlib::{analyse_pair, AnnotationTable};
//!
//! let table = AnnotationTable::load("annotations.csv".as_ref()).unwrap();
//! let set = analyse_pair(&table, 0, 36, 46);
//! for m in &set.matches {
//!     println!("{} {} {}", m.kind, m.left.tag, m.right.tag);
//! }
//! ```

pub mod archive;
pub mod charts;
pub mod config;
pub mod document;
pub mod engraver;
pub mod error;
pub mod matching;
pub mod model;
pub mod parser;
pub mod partition;
pub mod renderer;
pub mod score_colors;
pub mod similarity;
pub mod table;

pub use config::Config;
pub use error::{PatternError, Result};
pub use matching::{analyse_all, analyse_pair, build_matches, classify, MatchSet};
pub use model::*;
pub use parser::extract_note_ids;
pub use partition::{GreedyFirstFit, Layer, PartitionStrategy};
pub use renderer::{overlay_all, visualize_all, visualize_song};
pub use similarity::{jaccard, SimilarityMatrix};
pub use table::{AnnotationRow, AnnotationTable};
