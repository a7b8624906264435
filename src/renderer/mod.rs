//! Overlay renderer: draws annotation agreement onto engraved score pages
//! and renders similarity heat-maps.
//!
//! Pages come from a [`ScoreRenderer`](crate::engraver::ScoreRenderer). Every
//! output file is a fresh rewrite of the untouched page, so variants never
//! see each other's marks.

mod constants;
pub(crate) mod matrix;
pub mod layout;
pub mod overlay;
pub mod page;
pub(crate) mod svg_builder;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::engraver::{render_song, PrerenderedSvg, SongCatalog};
use crate::error::{self, Result};
use crate::matching::{relation_files, MatchSet};
use crate::model::{Side, SongId};
use crate::partition::{collect_side, GreedyFirstFit, PartitionStrategy};
use crate::table::AnnotationTable;
use overlay::{match_variants, tag_edit};
use page::RenderedPage;

pub use layout::{Jitter, PagePlacer, Placement, Rect};
pub use overlay::PageVariant;

// ═══════════════════════════════════════════════════════════════════════
// Page source
// ═══════════════════════════════════════════════════════════════════════

/// Rendered pages of one song from the pre-rendered page folder. Pages that
/// fail to parse are left out.
pub fn song_pages(catalog: &SongCatalog, song_id: SongId) -> Vec<RenderedPage> {
    let files = catalog.song_files(song_id, &["svg"]);
    let mut renderer = PrerenderedSvg::new();
    render_song(&mut renderer, &files)
}

fn usable(page: &RenderedPage) -> bool {
    if !page.has_margin() {
        warn!(page = %page.stem, "page has no page-margin group, skipping");
        return false;
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════
// Match visualization
// ═══════════════════════════════════════════════════════════════════════

/// Draw one persisted relation on every page of its song.
///
/// Both sides are split into note-disjoint layers and each (left, right)
/// layer pair becomes its own file under `{output}/{song}/`.
pub fn visualize_song(
    set: &MatchSet,
    pages: &[RenderedPage],
    strategy: &dyn PartitionStrategy,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let left_layers = strategy.partition(&collect_side(&set.matches, Side::Left));
    let right_layers = strategy.partition(&collect_side(&set.matches, Side::Right));
    let dir = config.paths.output_dir.join(set.song_id.to_string());

    let mut written = Vec::new();
    for page in pages.iter().filter(|p| usable(p)) {
        let variants = match_variants(
            page,
            &set.matches,
            &left_layers,
            &right_layers,
            (set.first, set.second),
            config,
        )?;
        for variant in variants {
            let path = dir.join(&variant.file_name);
            error::write_file(&path, &variant.svg)?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Visualize every relation file in the results folder.
///
/// Only a missing results or page folder fails the run. An unreadable
/// relation file or a song that cannot be drawn is skipped with a warning.
#[tracing::instrument(skip_all)]
pub fn visualize_all(config: &Config) -> Result<Vec<PathBuf>> {
    let files = relation_files(&config.paths.results_dir)?;
    let catalog = SongCatalog::open(&config.paths.pages_dir)?;

    let mut written = Vec::new();
    for file in files {
        let set = match MatchSet::read(&file) {
            Ok(set) => set,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable relation file");
                continue;
            }
        };
        if set.matches.is_empty() {
            continue;
        }
        let pages = song_pages(&catalog, set.song_id);
        if pages.is_empty() {
            warn!(song_id = set.song_id, "no rendered pages for song, skipping");
            continue;
        }
        let out = match visualize_song(&set, &pages, &GreedyFirstFit, config) {
            Ok(out) => out,
            Err(e) => {
                warn!(song_id = set.song_id, error = %e, "relation not visualized");
                continue;
            }
        };
        info!(
            song_id = set.song_id,
            first = set.first,
            second = set.second,
            files = out.len(),
            "relation visualized"
        );
        written.extend(out);
    }
    Ok(written)
}

// ═══════════════════════════════════════════════════════════════════════
// Tag overlay
// ═══════════════════════════════════════════════════════════════════════

/// Box every annotated pattern of a song on its pages, colored by tag.
pub fn overlay_song(
    table: &AnnotationTable,
    song_id: SongId,
    pages: &[RenderedPage],
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let instances = table.song_instances(song_id);
    let mut written = Vec::new();
    if instances.is_empty() {
        return Ok(written);
    }
    for page in pages.iter().filter(|p| usable(p)) {
        let (edit, off_page) = tag_edit(page, &instances, config);
        if edit.is_empty() {
            continue;
        }
        let path = config
            .paths
            .output_dir
            .join(format!("{}_annotated.svg", page.stem));
        error::write_file(&path, page.markup().rewrite(&edit)?)?;
        info!(page = %page.stem, patterns = instances.len() - off_page, "tag overlay written");
        written.push(path);
    }
    Ok(written)
}

/// Tag overlays for every configured song. A song that fails is skipped
/// with a warning.
#[tracing::instrument(skip_all)]
pub fn overlay_all(config: &Config, table: &AnnotationTable) -> Result<Vec<PathBuf>> {
    let catalog = SongCatalog::open(&config.paths.pages_dir)?;
    let mut written = Vec::new();
    for song_id in config.songs() {
        let pages = song_pages(&catalog, song_id);
        if pages.is_empty() {
            warn!(song_id, "no rendered pages for song, skipping");
            continue;
        }
        match overlay_song(table, song_id, &pages, config) {
            Ok(out) => written.extend(out),
            Err(e) => warn!(song_id, error = %e, "tag overlay failed"),
        }
    }
    Ok(written)
}
