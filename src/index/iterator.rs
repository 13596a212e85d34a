//! Region-query iteration.
//!
//! An [IndexIterator] walks the index cells that overlap a query box and
//! yields conforming point ids in chunks. Cells entirely inside the box
//! contribute their ids without any point tests; border cells are resolved
//! by reading just enough of each candidate point to test it against the
//! box.

use super::SpatialIndex;
use crate::{Bounds, Result};
use std::io::{Read, Seek};

/// Precomputed cell ranges for one query box.
#[derive(Clone, Debug)]
pub(crate) struct FilterContext {
    pub(crate) bounds: Bounds,
    pub(crate) no_filter_x: bool,
    pub(crate) no_filter_y: bool,
    pub(crate) no_filter_z: bool,
    pub(crate) low_x_completely_in: i64,
    pub(crate) high_x_completely_in: i64,
    pub(crate) low_y_completely_in: i64,
    pub(crate) high_y_completely_in: i64,
    pub(crate) low_z_completely_in: i64,
    pub(crate) high_z_completely_in: i64,
    pub(crate) low_x_border: i64,
    pub(crate) high_x_border: i64,
    pub(crate) low_y_border: i64,
    pub(crate) high_y_border: i64,
    pub(crate) low_z_border: i64,
    pub(crate) high_z_border: i64,
    pub(crate) low_x_border_part: f64,
    pub(crate) high_x_border_part: f64,
    pub(crate) low_y_border_part: f64,
    pub(crate) high_y_border_part: f64,
}

impl FilterContext {
    /// Converts a query box into cell ranges against an index's grid.
    pub(crate) fn new<R: Read + Seek>(index: &SpatialIndex<R>, query: &Bounds) -> FilterContext {
        let mut bounds = *query;
        bounds.clip(&index.bounds());

        let no_filter_x = bounds.min.x == bounds.max.x;
        let no_filter_y = bounds.min.y == bounds.max.y;
        let no_filter_z = bounds.min.z == bounds.max.z;

        let min = index.bounds().min;
        let cells_x = f64::from(index.cells_x());
        let cells_y = f64::from(index.cells_y());
        let cells_z = f64::from(index.cells_z());

        // X and Y ranges can not be zero or the index would not have been
        // built; Z however can be.
        let filter_min_x = cells_x * (bounds.min.x - min.x) / index.range_x();
        let filter_max_x = cells_x * (bounds.max.x - min.x) / index.range_x();
        let filter_min_y = cells_y * (bounds.min.y - min.y) / index.range_y();
        let filter_max_y = cells_y * (bounds.max.y - min.y) / index.range_y();
        let (filter_min_z, filter_max_z) = if index.range_z() > 0. {
            (
                cells_z * (bounds.min.z - min.z) / index.range_z(),
                cells_z * (bounds.max.z - min.z) / index.range_z(),
            )
        } else {
            (0., 0.)
        };

        let low_x_completely_in = filter_min_x.ceil() as i64;
        let high_x_completely_in = filter_max_x.floor() as i64 - 1;
        let low_y_completely_in = filter_min_y.ceil() as i64;
        let high_y_completely_in = filter_max_y.floor() as i64 - 1;
        let low_z_completely_in = filter_min_z.ceil() as i64;
        let high_z_completely_in = filter_max_z.floor() as i64 - 1;

        let low_x_border = filter_min_x.floor() as i64;
        let high_x_border = filter_max_x.ceil() as i64 - 1;
        let low_y_border = filter_min_y.floor() as i64;
        let high_y_border = filter_max_y.ceil() as i64 - 1;
        let low_z_border = filter_min_z.floor() as i64;
        let high_z_border = filter_max_z.ceil() as i64 - 1;

        FilterContext {
            bounds,
            no_filter_x,
            no_filter_y,
            no_filter_z,
            low_x_completely_in,
            high_x_completely_in,
            low_y_completely_in,
            high_y_completely_in,
            low_z_completely_in,
            high_z_completely_in,
            low_x_border,
            high_x_border,
            low_y_border,
            high_y_border,
            low_z_border,
            high_z_border,
            low_x_border_part: filter_min_x - low_x_border as f64,
            high_x_border_part: filter_max_x - high_x_border as f64,
            low_y_border_part: filter_min_y - low_y_border as f64,
            high_y_border_part: filter_max_y - high_y_border as f64,
        }
    }

    /// Does a cell overlap the query at all?
    pub(crate) fn cell_interesting(&self, x: u32, y: u32) -> bool {
        let x = i64::from(x);
        let y = i64::from(y);
        (self.no_filter_x || (x >= self.low_x_border && x <= self.high_x_border))
            && (self.no_filter_y || (y >= self.low_y_border && y <= self.high_y_border))
    }

    /// Does a Z bin overlap the query?
    pub(crate) fn z_cell_interesting(&self, z: u32) -> bool {
        let z = i64::from(z);
        self.no_filter_z || (z >= self.low_z_border && z <= self.high_z_border)
    }

    /// Does a quadrant of a border cell overlap the query?
    ///
    /// Only needed on border cells; a quadrant on the query side of the
    /// half-cell split can be skipped without per-point tests.
    pub(crate) fn sub_cell_interesting(&self, sub_cell: u32, x: u32, y: u32) -> bool {
        let x = i64::from(x);
        let y = i64::from(y);
        let low_half_x = sub_cell == 0 || sub_cell == 2;
        let x_good = if self.no_filter_x
            || (x >= self.low_x_completely_in && x <= self.high_x_completely_in)
        {
            true
        } else if x == self.low_x_border {
            // lower border cell: the low half only matters when the query
            // boundary falls inside it
            if low_half_x {
                self.low_x_border_part <= 0.5
            } else {
                true
            }
        } else if low_half_x {
            true
        } else {
            self.high_x_border_part > 0.5
        };
        if !x_good {
            return false;
        }
        let low_half_y = sub_cell == 0 || sub_cell == 1;
        if self.no_filter_y || (y >= self.low_y_completely_in && y <= self.high_y_completely_in) {
            true
        } else if y == self.low_y_border {
            if low_half_y {
                self.low_y_border_part <= 0.5
            } else {
                true
            }
        } else if low_half_y {
            true
        } else {
            self.high_y_border_part > 0.5
        }
    }
}

/// Mutable position of one query walk.
#[derive(Clone, Debug, Default)]
pub(crate) struct IterState {
    pub(crate) cur_block: usize,
    pub(crate) cur_cell: usize,
    pub(crate) pts_scanned_cur_cell: u64,
    pub(crate) total_points_scanned: u64,
    pub(crate) conforming_found: u64,
    pub(crate) advance: u64,
}

impl IterState {
    fn reset(&mut self) {
        *self = IterState::default();
    }
}

/// Iterator-style access to the points conforming to one query box.
///
/// The returned slice is reused across calls; copy it if it must outlive
/// the next call.
pub struct IndexIterator<'a, R: Read + Seek> {
    index: &'a mut SpatialIndex<R>,
    ctx: FilterContext,
    chunk_size: u32,
    state: IterState,
    result: Vec<u32>,
}

impl<'a, R: Read + Seek> IndexIterator<'a, R> {
    pub(crate) fn new(
        index: &'a mut SpatialIndex<R>,
        query: Bounds,
        chunk_size: u32,
    ) -> IndexIterator<'a, R> {
        let ctx = FilterContext::new(index, &query);
        IndexIterator {
            index,
            ctx,
            chunk_size,
            state: IterState::default(),
            result: Vec::new(),
        }
    }

    /// Returns up to `chunk_size` conforming ids, continuing from the
    /// current position.
    pub fn next_chunk(&mut self) -> Result<&[u32]> {
        let conforming = self.state.conforming_found;
        self.at(conforming)
    }

    /// Rewinds and replays to the `n`-th conforming point (zero-based),
    /// returning up to `chunk_size` ids starting there.
    pub fn at(&mut self, n: u64) -> Result<&[u32]> {
        if n < self.state.conforming_found {
            self.state.reset();
            self.state.advance = n + 1;
        } else {
            self.state.advance = n - self.state.conforming_found + 1;
        }
        self.index.filter_into(
            &self.ctx,
            self.chunk_size,
            &mut self.state,
            &mut self.result,
        )?;
        Ok(&self.result)
    }

    /// Advances `n` conforming points beyond the current position.
    pub fn advance(&mut self, n: u64) -> Result<&[u32]> {
        let target = self.state.conforming_found + n.saturating_sub(1);
        self.at(target)
    }

    /// Returns how many conforming points have been seen so far.
    pub fn conforming_found(&self) -> u64 {
        self.state.conforming_found
    }
}

impl<R: Read + Seek> std::fmt::Debug for IndexIterator<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexIterator")
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state)
            .finish()
    }
}
