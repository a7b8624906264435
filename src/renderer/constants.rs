//! Shared constants for overlay and chart rendering.
//!
//! Page-space geometry of the placer is configurable (see
//! [`crate::config::Geometry`]); the values here only style emitted elements.

// ── Overlay elements ────────────────────────────────────────────────
pub(super) const BOX_FILL: &str = "none";
pub(super) const LABEL_FONT_WEIGHT: &str = "bold";
pub(super) const LABEL_ANCHOR: &str = "middle";

// ── Similarity matrix ───────────────────────────────────────────────
pub(super) const MATRIX_CELL: f64 = 64.0;
pub(super) const MATRIX_MARGIN_LEFT: f64 = 70.0;
pub(super) const MATRIX_MARGIN_TOP: f64 = 70.0;
pub(super) const MATRIX_MARGIN_RIGHT: f64 = 20.0;
pub(super) const MATRIX_MARGIN_BOTTOM: f64 = 30.0;
pub(super) const MATRIX_FONT_SIZE: f64 = 14.0;
pub(super) const MATRIX_TITLE_SIZE: f64 = 16.0;
pub(super) const MATRIX_GRID_COLOR: &str = "#ffffff";
pub(super) const MATRIX_TEXT_COLOR: &str = "#1a1a1a";
pub(super) const MATRIX_LABEL_COLOR: &str = "#555555";
