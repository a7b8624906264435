//! Score engraving contract: how pages are obtained for overlays.
//!
//! Engraving itself is done by an external renderer. Anything that can load a
//! score file and hand back one SVG per page implements [`ScoreRenderer`];
//! [`PrerenderedSvg`] serves SVG files rendered ahead of time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{find_by_id, DocumentEdit, Markup, StylePatch};
use crate::error::{self, PatternError, Result};
use crate::model::SongId;
use crate::renderer::page::RenderedPage;

// ═══════════════════════════════════════════════════════════════════════
// Options
// ═══════════════════════════════════════════════════════════════════════

/// One element the renderer should emphasize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Highlight {
    pub id: String,
    pub color: Option<String>,
    pub opacity: Option<f64>,
    pub fill: Option<String>,
    /// `"notehead"` targets the note's head glyph instead of the whole group
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub page_width: Option<u32>,
    pub page_height: Option<u32>,
    pub scale: Option<u32>,
    pub highlights: Vec<Highlight>,
}

impl Highlight {
    fn to_patch(&self) -> StylePatch {
        let mut patch = StylePatch {
            target: self.id.clone(),
            ..StylePatch::default()
        };
        let on_head = self.region.as_deref() == Some("notehead");
        let attrs = if on_head { &mut patch.notehead } else { &mut patch.attrs };
        if let Some(color) = &self.color {
            attrs.push(("color".into(), color.clone()));
        }
        if let Some(fill) = self.fill.as_ref().or(self.color.as_ref().filter(|_| on_head)) {
            attrs.push(("fill".into(), fill.clone()));
        }
        if let Some(opacity) = self.opacity {
            attrs.push(("opacity".into(), opacity.to_string()));
        }
        patch
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Renderer contract
// ═══════════════════════════════════════════════════════════════════════

pub trait ScoreRenderer {
    fn set_options(&mut self, options: &RenderOptions);
    fn load_file(&mut self, path: &Path) -> Result<()>;
    fn page_count(&self) -> usize;
    /// SVG of one page, numbered from 1.
    fn render_to_svg(&self, page: usize) -> Result<String>;
}

/// Serves SVG files that were engraved ahead of time. Each loaded file is one
/// page. Layout options are kept but cannot reflow a finished page;
/// highlights are applied as style patches.
#[derive(Debug, Default)]
pub struct PrerenderedSvg {
    options: RenderOptions,
    page: Option<Markup>,
}

impl PrerenderedSvg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Highlight ids with no matching element on the loaded page.
    pub fn unmatched_highlights(&self) -> Result<Vec<&str>> {
        let Some(markup) = &self.page else {
            return Ok(Vec::new());
        };
        let doc = markup.parse()?;
        Ok(self
            .options
            .highlights
            .iter()
            .map(|h| h.id.as_str())
            .filter(|id| find_by_id(&doc, id).is_none())
            .collect())
    }
}

impl ScoreRenderer for PrerenderedSvg {
    fn set_options(&mut self, options: &RenderOptions) {
        self.options = options.clone();
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let markup = Markup::new(error::read_to_string(path)?);
        markup.parse()?;
        self.page = Some(markup);
        Ok(())
    }

    fn page_count(&self) -> usize {
        usize::from(self.page.is_some())
    }

    fn render_to_svg(&self, page: usize) -> Result<String> {
        let markup = match (&self.page, page) {
            (Some(markup), 1) => markup,
            (None, _) => return Err(PatternError::format("no score loaded")),
            (Some(_), n) => return Err(PatternError::format(format!("page {n} out of range"))),
        };
        if self.options.highlights.is_empty() {
            return Ok(markup.source().to_string());
        }
        let unmatched = self.unmatched_highlights()?;
        if !unmatched.is_empty() {
            warn!(page, ids = ?unmatched, "highlight targets not on page");
        }
        let edit = DocumentEdit {
            patches: self.options.highlights.iter().map(Highlight::to_patch).collect(),
            appended: Vec::new(),
        };
        markup.rewrite(&edit)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Song catalog
// ═══════════════════════════════════════════════════════════════════════

/// Files of a folder named after their song: `000_title.svg`, `001_...`.
#[derive(Debug, Clone)]
pub struct SongCatalog {
    files: Vec<PathBuf>,
}

impl SongCatalog {
    /// List a folder. A missing folder is an error.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PatternError::missing(format!("score folder {}", dir.display())));
        }
        let entries = std::fs::read_dir(dir).map_err(|e| PatternError::io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PatternError::io(dir, e))?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files of one song with one of the given extensions, sorted by name.
    pub fn song_files(&self, song_id: SongId, extensions: &[&str]) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|p| song_of(p) == Some(song_id))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            })
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Song index from the first three characters of a file name.
pub fn song_of(path: &Path) -> Option<SongId> {
    let name = path.file_name()?.to_str()?;
    name.get(..3)?.parse().ok()
}

/// Engrave every score file of a song and index the pages.
///
/// Multi-page files get a `_p{n}` suffix on the page stem. A file that cannot
/// be loaded or whose pages do not parse is skipped with a warning.
pub fn render_song<R: ScoreRenderer>(renderer: &mut R, files: &[&Path]) -> Vec<RenderedPage> {
    let mut pages = Vec::new();
    for path in files {
        match render_file(renderer, path) {
            Ok(mut file_pages) => {
                debug!(file = %path.display(), pages = file_pages.len(), "engraved");
                pages.append(&mut file_pages);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable score file"),
        }
    }
    pages
}

fn render_file<R: ScoreRenderer>(renderer: &mut R, path: &Path) -> Result<Vec<RenderedPage>> {
    renderer.load_file(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PatternError::format(format!("bad file name {}", path.display())))?;
    let count = renderer.page_count();
    if count == 0 {
        warn!(file = %path.display(), "renderer produced no pages");
    }
    (1..=count)
        .map(|n| {
            let page_stem = if count == 1 { stem.to_string() } else { format!("{stem}_p{n}") };
            RenderedPage::from_svg(page_stem, renderer.render_to_svg(n)?)
        })
        .collect()
}
