//! Page overlays: turns match relations and annotation rows into document
//! edits for rendered pages.
//!
//! Each output variant starts from the untouched page. All note colors,
//! boxes and labels of the variant are collected into one [`DocumentEdit`]
//! and applied in a single rewrite.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::layout::{earliest, latest, Jitter, PagePlacer, Placement};
use super::page::RenderedPage;
use super::svg_builder::{box_label, box_outline};
use crate::config::Config;
use crate::document::{DocumentEdit, StylePatch};
use crate::error::Result;
use crate::model::{MatchKind, MatchRecord, PatternInstance, Point};
use crate::partition::Layer;

/// One annotated copy of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageVariant {
    pub file_name: String,
    pub svg: String,
}

fn append_placement(
    edit: &mut DocumentEdit,
    placement: &Placement,
    text: &str,
    (stroke, text_color): (&str, &str),
    config: &Config,
) {
    let g = &config.geometry;
    for rect in &placement.boxes {
        edit.appended.push(box_outline(rect, stroke, g.box_stroke_width));
    }
    edit.appended
        .push(box_label(&placement.label, text, text_color, g.label_font_size));
}

// ═══════════════════════════════════════════════════════════════════════
// Match overlays
// ═══════════════════════════════════════════════════════════════════════

/// Color of a shared note for a match of this kind.
fn shared_color(kind: MatchKind, config: &Config) -> &str {
    if kind.is_containment() {
        &config.palette.contained
    } else {
        &config.palette.intersect
    }
}

/// Edit drawing the given matches onto a page.
///
/// Notes only in the left pattern get the first annotator's color, notes
/// only in the right pattern the second annotator's, shared notes the color
/// of the match kind. Each match gets a box from the earliest start note to
/// the latest end note found on the page.
pub fn match_edit(page: &RenderedPage, matches: &[&MatchRecord], config: &Config) -> DocumentEdit {
    let palette = &config.palette;
    let tolerance = config.geometry.row_tolerance;
    let mut placer = PagePlacer::new(&config.geometry, Jitter::new(config.jitter_seed));
    let mut edit = DocumentEdit::default();

    for m in matches {
        let (left, right) = (&m.left, &m.right);

        for note in &left.note_ids {
            if !page.contains(note) {
                continue;
            }
            let color = if !right.contains_note(note) {
                palette.first_only.as_str()
            } else {
                shared_color(m.kind, config)
            };
            edit.patches.push(StylePatch::note_color(note, color));
        }
        for note in right.note_ids.iter().filter(|n| !left.contains_note(n)) {
            if page.contains(note) {
                edit.patches
                    .push(StylePatch::note_color(note, palette.second_only.as_str()));
            }
        }

        let starts: Vec<Point> = [left.first_note(), right.first_note()]
            .into_iter()
            .flatten()
            .filter_map(|id| page.position(id))
            .collect();
        let ends: Vec<Point> = [left.last_note(), right.last_note()]
            .into_iter()
            .flatten()
            .filter_map(|id| page.position(id))
            .collect();

        let start = earliest(starts, tolerance);
        let end = latest(ends, tolerance);
        if let Some(placement) = placer.place_span(start, end) {
            let text = format!("{} {} {}", m.kind, left.tag, right.tag);
            let stroke = shared_color(m.kind, config);
            append_placement(&mut edit, &placement, &text, (stroke, palette.label.as_str()), config);
        }
    }
    edit
}

/// Render every (left layer, right layer) combination of a relation onto a
/// page. Variants with nothing drawn are skipped.
pub fn match_variants(
    page: &RenderedPage,
    matches: &[MatchRecord],
    left_layers: &[Layer],
    right_layers: &[Layer],
    names: (i64, i64),
    config: &Config,
) -> Result<Vec<PageVariant>> {
    let (first, second) = names;
    let mut variants = Vec::new();

    for (i, left_layer) in left_layers.iter().enumerate() {
        let left_ids: HashSet<usize> = left_layer.iter().map(|p| p.id).collect();
        for (j, right_layer) in right_layers.iter().enumerate() {
            let right_ids: HashSet<usize> = right_layer.iter().map(|p| p.id).collect();
            let selected: Vec<&MatchRecord> = matches
                .iter()
                .filter(|m| left_ids.contains(&m.left.id) && right_ids.contains(&m.right.id))
                .collect();
            if selected.is_empty() {
                continue;
            }
            let edit = match_edit(page, &selected, config);
            if edit.is_empty() {
                debug!(page = %page.stem, i, j, "no matched notes on page");
                continue;
            }
            variants.push(PageVariant {
                file_name: format!("{}_{first}_{second}_{i}_{j}.svg", page.stem),
                svg: page.markup().rewrite(&edit)?,
            });
        }
    }
    Ok(variants)
}

// ═══════════════════════════════════════════════════════════════════════
// Tag overlays
// ═══════════════════════════════════════════════════════════════════════

/// Color per distinct tag, assigned in order of first appearance.
pub fn tag_colors<'a>(instances: &'a [PatternInstance], config: &Config) -> HashMap<&'a str, String> {
    let mut colors: HashMap<&str, String> = HashMap::new();
    for p in instances {
        let next = colors.len();
        colors
            .entry(p.tag.as_str())
            .or_insert_with(|| config.palette.tag_color(next).to_string());
    }
    colors
}

/// Label of a pattern in a tag overlay: `"tag (rank)"`.
pub fn tag_label(instance: &PatternInstance) -> String {
    match instance.rank.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(rank) => format!("{} ({rank})", instance.tag),
        None => instance.tag.clone(),
    }
}

/// Edit boxing every pattern of a song on a page, colored by tag.
/// Returns the edit and the number of patterns with no boundary note on the page.
pub fn tag_edit(page: &RenderedPage, instances: &[PatternInstance], config: &Config) -> (DocumentEdit, usize) {
    let colors = tag_colors(instances, config);
    let mut placer = PagePlacer::new(&config.geometry, Jitter::new(config.jitter_seed));
    let mut edit = DocumentEdit::default();
    let mut missing = 0;

    for p in instances {
        let start = p.first_note().and_then(|id| page.position(id));
        let end = p.last_note().and_then(|id| page.position(id));
        match placer.place_span(start, end) {
            Some(placement) => {
                let color = colors.get(p.tag.as_str()).map(String::as_str).unwrap_or("#000000");
                append_placement(&mut edit, &placement, &tag_label(p), (color, color), config);
            }
            None => missing += 1,
        }
    }
    (edit, missing)
}
