//! Uniform bucket grid accelerating mosher neighborhood queries.
//!
//! The arena is partitioned into `cols x rows` cells whose side is at least
//! the largest interaction cutoff, so a 3x3 block of cells always covers the
//! neighborhood of any particle in the center cell. The grid holds no
//! identity across ticks: it is rebuilt from scratch every tick into
//! preallocated buffers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of particle indices a single cell can hold.
///
/// A cell whose true occupancy exceeds this drops the excess indices for the
/// current rebuild only; which indices survive is insertion-order dependent.
pub const CELL_CAPACITY: usize = 64;

/// Errors emitted when constructing a grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// Indicates configuration values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Outcome of a grid rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Indices left out of their cell because it was already at capacity.
    pub dropped: u32,
}

/// Fixed-capacity bucket grid over a rectangular arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketGrid {
    cols: usize,
    rows: usize,
    cell_width: f64,
    cell_height: f64,
    arena_width: f64,
    arena_height: f64,
    #[serde(skip)]
    slots: Vec<u32>,
    #[serde(skip)]
    counts: Vec<u16>,
}

impl BucketGrid {
    /// Create a grid over `arena_width x arena_height` whose cells are at
    /// least `min_cell` on each side.
    pub fn new(arena_width: f64, arena_height: f64, min_cell: f64) -> Result<Self, GridError> {
        if !(arena_width.is_finite() && arena_width > 0.0)
            || !(arena_height.is_finite() && arena_height > 0.0)
        {
            return Err(GridError::InvalidConfig(
                "arena extents must be positive and finite",
            ));
        }
        if !(min_cell.is_finite() && min_cell > 0.0) {
            return Err(GridError::InvalidConfig(
                "minimum cell extent must be positive and finite",
            ));
        }
        let cols = ((arena_width / min_cell).floor() as usize).max(1);
        let rows = ((arena_height / min_cell).floor() as usize).max(1);
        Ok(Self {
            cols,
            rows,
            cell_width: arena_width / cols as f64,
            cell_height: arena_height / rows as f64,
            arena_width,
            arena_height,
            slots: vec![0; cols * rows * CELL_CAPACITY],
            counts: vec![0; cols * rows],
        })
    }

    /// Number of cell columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cell rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Width of one cell in arena units.
    #[must_use]
    pub const fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Height of one cell in arena units.
    #[must_use]
    pub const fn cell_height(&self) -> f64 {
        self.cell_height
    }

    /// Cell coordinates containing the arena position `(x, y)`.
    ///
    /// Positions on the far edge clamp into the last cell so callers that
    /// maintain the `[0, extent)` invariant can never index out of range.
    #[must_use]
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let cx = ((x / self.cell_width) as usize).min(self.cols - 1);
        let cy = ((y / self.cell_height) as usize).min(self.rows - 1);
        (cx, cy)
    }

    /// Rebuild all cell lists from `positions`.
    ///
    /// Buffers are cleared and reused, never reallocated on the steady path.
    /// Indices that would overflow their cell are dropped for this rebuild
    /// and counted in the returned report; the grid never writes past a
    /// cell's capacity.
    pub fn rebuild(&mut self, positions: &[(f64, f64)]) -> RebuildReport {
        debug_assert!(positions.len() <= u32::MAX as usize);
        let cell_count = self.cols * self.rows;
        if self.counts.len() != cell_count {
            // Serde round-trips skip the transient buffers; restore them.
            self.counts.resize(cell_count, 0);
            self.slots.resize(cell_count * CELL_CAPACITY, 0);
        }
        self.counts.fill(0);

        let mut dropped = 0u32;
        for (index, &(x, y)) in positions.iter().enumerate() {
            let (cx, cy) = self.cell_of(x, y);
            let cell = cy * self.cols + cx;
            let count = self.counts[cell] as usize;
            if count >= CELL_CAPACITY {
                dropped += 1;
                continue;
            }
            self.slots[cell * CELL_CAPACITY + count] = index as u32;
            self.counts[cell] = (count + 1) as u16;
        }
        RebuildReport { dropped }
    }

    /// Indices currently stored in the cell at `(cx, cy)`.
    #[must_use]
    pub fn cell_entries(&self, cx: usize, cy: usize) -> &[u32] {
        let cell = cy * self.cols + cx;
        let count = self.counts[cell] as usize;
        &self.slots[cell * CELL_CAPACITY..cell * CELL_CAPACITY + count]
    }

    /// Total number of indices stored across all cells.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    /// Visit every index in the 3x3 block of cells centered on `cell`.
    ///
    /// On a wrapping axis, blocks past the edge wrap around and the visitor
    /// receives the image shift (plus or minus the arena extent) to add to
    /// the stored position of each yielded index. On a clipping axis, blocks
    /// past the edge are skipped entirely.
    pub fn visit_block<F>(&self, cell: (usize, usize), wrap_x: bool, wrap_y: bool, visitor: &mut F)
    where
        F: FnMut(u32, f64, f64),
    {
        let (cx, cy) = cell;
        debug_assert!(cx < self.cols && cy < self.rows);
        for dy in -1i64..=1 {
            let row = cy as i64 + dy;
            let (row, shift_y) = if row < 0 {
                if !wrap_y {
                    continue;
                }
                (self.rows - 1, -self.arena_height)
            } else if row >= self.rows as i64 {
                if !wrap_y {
                    continue;
                }
                (0, self.arena_height)
            } else {
                (row as usize, 0.0)
            };
            for dx in -1i64..=1 {
                let col = cx as i64 + dx;
                let (col, shift_x) = if col < 0 {
                    if !wrap_x {
                        continue;
                    }
                    (self.cols - 1, -self.arena_width)
                } else if col >= self.cols as i64 {
                    if !wrap_x {
                        continue;
                    }
                    (0, self.arena_width)
                } else {
                    (col as usize, 0.0)
                };
                for &index in self.cell_entries(col, row) {
                    visitor(index, shift_x, shift_y);
                }
            }
        }
    }
}
