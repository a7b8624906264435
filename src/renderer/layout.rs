//! Overlay layout: places annotation boxes and their labels on a rendered
//! page without visual collisions.
//!
//! Every accepted location is recorded in the page's region registry. A
//! candidate that comes too close to a recorded region is moved down by one
//! text height until it is clear, so the registry only ever grows and no two
//! recorded regions are too close to each other.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Geometry;
use crate::model::Point;

// ═══════════════════════════════════════════════════════════════════════
// Layout structures
// ═══════════════════════════════════════════════════════════════════════

/// A location committed to the page layout. Height is implicit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Anchor of a text label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label {
    pub x: f64,
    pub y: f64,
}

/// The boxes drawn for one span and the position of its label.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub boxes: Vec<Rect>,
    pub label: Label,
}

/// Asymmetric proximity test: tolerant along x when the recorded region is wide.
pub fn too_close(geometry: &Geometry, existing: &PlacedRegion, x: f64, y: f64) -> bool {
    (existing.x - x).abs() < 2.0 * geometry.min_text_width.max(existing.width)
        && (existing.y - y).abs() < geometry.min_text_height
}

/// Text baseline of the system band containing the rectangle's center.
pub fn system_baseline(geometry: &Geometry, rect: &Rect) -> f64 {
    let center = (rect.y + (rect.height / 2.0).floor() - geometry.system_start).max(0.0);
    let band = (center / geometry.system_height).floor();
    geometry.textline_start + band * geometry.system_height
}

/// True when `a` comes before `b` in reading order: on a higher row, or on
/// the same row and further left.
pub fn precedes(a: Point, b: Point, row_tolerance: f64) -> bool {
    a.y < b.y - row_tolerance || ((a.y - b.y).abs() < row_tolerance && a.x < b.x)
}

/// Earliest point in reading order.
pub fn earliest(points: impl IntoIterator<Item = Point>, row_tolerance: f64) -> Option<Point> {
    points
        .into_iter()
        .reduce(|best, p| if precedes(p, best, row_tolerance) { p } else { best })
}

/// Latest point in reading order.
pub fn latest(points: impl IntoIterator<Item = Point>, row_tolerance: f64) -> Option<Point> {
    points
        .into_iter()
        .reduce(|best, p| if precedes(best, p, row_tolerance) { p } else { best })
}

// ═══════════════════════════════════════════════════════════════════════
// Jitter
// ═══════════════════════════════════════════════════════════════════════

/// Optional seeded offsets that keep coincident boxes from drawing exactly
/// on top of each other. Disabled jitter yields zero everywhere.
pub struct Jitter {
    rng: Option<StdRng>,
}

impl Jitter {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map(StdRng::seed_from_u64),
        }
    }

    pub fn disabled() -> Self {
        Self { rng: None }
    }

    /// Uniform offset in `[low, high)`, or 0 when disabled.
    fn offset(&mut self, low: u32, high: u32) -> f64 {
        match self.rng.as_mut() {
            Some(rng) if high > low => rng.gen_range(low..high) as f64,
            _ => 0.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Placer
// ═══════════════════════════════════════════════════════════════════════

/// Places boxes and labels for one page pass. Owns that page's registry.
pub struct PagePlacer<'g> {
    geometry: &'g Geometry,
    regions: Vec<PlacedRegion>,
    jitter: Jitter,
}

impl<'g> PagePlacer<'g> {
    pub fn new(geometry: &'g Geometry, jitter: Jitter) -> Self {
        Self {
            geometry,
            regions: Vec::new(),
            jitter,
        }
    }

    pub fn regions(&self) -> &[PlacedRegion] {
        &self.regions
    }

    fn collides(&self, x: f64, y: f64) -> bool {
        self.regions
            .iter()
            .any(|r| too_close(self.geometry, r, x, y))
    }

    /// Locations a box occupies: its top edge, and its bottom edge when the
    /// box is at least one text height tall.
    fn box_probes(&self, rect: &Rect) -> Vec<PlacedRegion> {
        let mut probes = vec![PlacedRegion {
            x: rect.x,
            y: rect.y,
            width: rect.width,
        }];
        if rect.height >= self.geometry.min_text_height {
            probes.push(PlacedRegion {
                x: rect.x,
                y: rect.bottom(),
                width: rect.width,
            });
        }
        probes
    }

    /// Move the box down until every probe is clear, then record it.
    fn settle_box(&mut self, mut rect: Rect) -> Rect {
        loop {
            let probes = self.box_probes(&rect);
            if probes.iter().any(|p| self.collides(p.x, p.y)) {
                rect.y += self.geometry.min_text_height;
                continue;
            }
            self.regions.extend(probes);
            return rect;
        }
    }

    fn settle_label(&mut self, x: f64, mut y: f64) -> Label {
        while self.collides(x, y) {
            y += self.geometry.min_text_height;
        }
        self.regions.push(PlacedRegion {
            x,
            y,
            width: self.geometry.min_text_width,
        });
        Label { x, y }
    }

    fn with_floors(&self, rect: Rect) -> Rect {
        Rect {
            width: rect.width.max(self.geometry.min_width),
            height: rect.height.max(self.geometry.min_height),
            ..rect
        }
    }

    /// Place a box request. `end` is the span's last note, used to anchor the
    /// bottom part of a split box.
    pub fn place_rect(&mut self, rect: Rect, end: Point) -> Placement {
        let g = self.geometry;
        let rect = self.with_floors(rect);

        let boxes = if rect.height > g.tall_threshold {
            let part_height = (rect.height / 3.0).floor();
            let mut parts = Vec::new();

            // runs past the notation into the right page margin
            let top = self.with_floors(Rect {
                x: rect.x,
                y: rect.y,
                width: g.content_right - rect.x - g.page_left,
                height: part_height,
            });
            let top = self.settle_box(top);
            parts.push(top);

            let bottom = self.with_floors(Rect {
                x: g.page_left,
                y: end.y - (part_height / 2.0).floor(),
                width: end.x + g.box_extra_width - g.page_left,
                height: part_height,
            });

            if rect.height > g.filler_threshold && g.filler_step > 0.0 {
                let count = (rect.height / g.filler_step).floor() as usize;
                for k in 1..count {
                    let y = top.y + k as f64 * g.filler_step;
                    if y >= bottom.y {
                        break;
                    }
                    let filler = self.with_floors(Rect {
                        x: g.page_left,
                        y,
                        width: g.full_width,
                        height: part_height,
                    });
                    parts.push(self.settle_box(filler));
                }
            }

            parts.push(self.settle_box(bottom));
            parts
        } else {
            vec![self.settle_box(rect)]
        };

        let anchor = boxes[0];
        let x = anchor.x + g.label_indent;
        let offset = self.jitter.offset(100, 200);
        let y = (system_baseline(g, &anchor) + offset).max(anchor.bottom() + g.label_gap);
        let label = self.settle_label(x, y);

        Placement { boxes, label }
    }

    /// Place the box of a span from its boundary notes.
    ///
    /// With only one boundary on the page the box runs to the page edge on the
    /// missing side. With neither, nothing is placed.
    pub fn place_span(&mut self, start: Option<Point>, end: Option<Point>) -> Option<Placement> {
        let g = self.geometry;
        match (start, end) {
            (None, None) => None,
            (Some(s), Some(e)) => {
                let x0 = s.x - g.start_pad_x - self.jitter.offset(0, 50);
                let y0 = s.y - g.start_pad_y - self.jitter.offset(0, 100);
                let width = (e.x - x0 + g.box_extra_width + self.jitter.offset(0, 100)).abs();
                let height = (e.y - y0 + g.box_extra_height + self.jitter.offset(0, 100)).abs();
                Some(self.place_rect(Rect { x: x0, y: y0, width, height }, e))
            }
            (Some(s), None) => {
                let x0 = s.x - g.start_pad_x - self.jitter.offset(0, 50);
                let y0 = s.y - g.start_pad_y - self.jitter.offset(0, 100);
                let rect = Rect {
                    x: x0,
                    y: y0,
                    width: g.page_right - x0,
                    height: g.min_height,
                };
                Some(self.place_rect(rect, Point::new(g.page_right, y0)))
            }
            (None, Some(e)) => {
                let y0 = e.y - g.start_pad_y - self.jitter.offset(0, 100);
                let rect = Rect {
                    x: g.page_left,
                    y: y0,
                    width: e.x - g.page_left,
                    height: g.min_height,
                };
                Some(self.place_rect(rect, e))
            }
        }
    }
}
