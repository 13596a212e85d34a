//! In-memory cell accumulation for the index builder.
//!
//! While pass one streams the file, each grid cell accumulates its points
//! as runs: a `(first point id, consecutive count)` pair covers every
//! sequence of consecutive points that landed in the same cell. Pass two
//! may redistribute a cell's runs into quadrant sub-cells or Z bins.

use std::collections::BTreeMap;

/// The largest consecutive-point count one run can hold.
pub(crate) const MAX_CONSECUTIVE: u8 = u8::MAX;

/// Runs keyed by their first point id.
pub(crate) type RunMap = BTreeMap<u32, u8>;

/// One grid cell being accumulated.
#[derive(Debug)]
pub(crate) struct IndexCell {
    /// Offset of this cell's most recent block in the temp file, zero
    /// before any purge.
    pub(crate) file_offset: u64,
    num_points: u32,
    min_z: f64,
    max_z: f64,
    records: RunMap,
    sub_cells: BTreeMap<u32, RunMap>,
    z_cells: BTreeMap<u32, RunMap>,
}

impl Default for IndexCell {
    fn default() -> IndexCell {
        IndexCell {
            file_offset: 0,
            num_points: 0,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
            records: RunMap::new(),
            sub_cells: BTreeMap::new(),
            z_cells: BTreeMap::new(),
        }
    }
}

impl IndexCell {
    /// Tries to extend the run that starts at `first`, returning false when
    /// there is no such run or it is full.
    pub(crate) fn increment_point_record(&mut self, first: u32) -> bool {
        match self.records.get_mut(&first) {
            Some(count) if *count < MAX_CONSECUTIVE => {
                *count += 1;
                self.num_points += 1;
                true
            }
            _ => false,
        }
    }

    /// Starts a new run at this point id.
    pub(crate) fn add_point_record(&mut self, first: u32) {
        let _ = self.records.insert(first, 1);
        self.num_points += 1;
    }

    /// Re-adds a run reloaded from the temp file.
    pub(crate) fn add_reloaded_record(&mut self, first: u32, count: u8) {
        let _ = self.records.insert(first, count);
        self.num_points += u32::from(count);
    }

    /// Widens the cell's Z range to cover this elevation.
    pub(crate) fn update_z_bounds(&mut self, z: f64) {
        if z < self.min_z {
            self.min_z = z;
        }
        if z > self.max_z {
            self.max_z = z;
        }
    }

    /// Returns the cell's Z extent, zero for an empty cell.
    pub(crate) fn z_range(&self) -> f64 {
        if self.min_z > self.max_z {
            0.
        } else {
            self.max_z - self.min_z
        }
    }

    /// Returns the number of points accumulated.
    pub(crate) fn num_points(&self) -> u32 {
        self.num_points
    }

    /// Resets the point counter, keeping the Z range.
    pub(crate) fn reset_num_points(&mut self) {
        self.num_points = 0;
    }

    /// Returns the number of runs currently in memory.
    pub(crate) fn num_records(&self) -> usize {
        self.records.len()
    }

    /// Returns the main runs.
    pub(crate) fn records(&self) -> &RunMap {
        &self.records
    }

    /// Tries to extend the sub-cell run that starts at `first`.
    pub(crate) fn increment_sub_cell(&mut self, sub_cell: u32, first: u32) -> bool {
        increment(&mut self.sub_cells, sub_cell, first)
    }

    /// Starts a new run in a quadrant sub-cell.
    pub(crate) fn add_sub_cell(&mut self, sub_cell: u32, first: u32) {
        let _ = self
            .sub_cells
            .entry(sub_cell)
            .or_default()
            .insert(first, 1);
    }

    /// Tries to extend the Z-bin run that starts at `first`.
    pub(crate) fn increment_z_cell(&mut self, z_cell: u32, first: u32) -> bool {
        increment(&mut self.z_cells, z_cell, first)
    }

    /// Starts a new run in a Z bin.
    pub(crate) fn add_z_cell(&mut self, z_cell: u32, first: u32) {
        let _ = self.z_cells.entry(z_cell).or_default().insert(first, 1);
    }

    /// Returns the quadrant sub-cells.
    pub(crate) fn sub_cells(&self) -> &BTreeMap<u32, RunMap> {
        &self.sub_cells
    }

    /// Returns the Z bins.
    pub(crate) fn z_cells(&self) -> &BTreeMap<u32, RunMap> {
        &self.z_cells
    }

    /// Drops the main runs, keeping any sub-cell or Z-bin redistribution.
    pub(crate) fn remove_main_records(&mut self) {
        self.records.clear();
    }

    /// Drops every run.
    pub(crate) fn remove_all_records(&mut self) {
        self.records.clear();
        self.sub_cells.clear();
        self.z_cells.clear();
    }
}

fn increment(groups: &mut BTreeMap<u32, RunMap>, group: u32, first: u32) -> bool {
    match groups.get_mut(&group).and_then(|runs| runs.get_mut(&first)) {
        Some(count) if *count < MAX_CONSECUTIVE => {
            *count += 1;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_extend_until_full() {
        let mut cell = IndexCell::default();
        cell.add_point_record(10);
        for _ in 0..(MAX_CONSECUTIVE as usize - 1) {
            assert!(cell.increment_point_record(10));
        }
        assert!(!cell.increment_point_record(10));
        assert_eq!(u32::from(MAX_CONSECUTIVE), cell.num_points());
        assert_eq!(1, cell.num_records());
    }

    #[test]
    fn z_bounds() {
        let mut cell = IndexCell::default();
        cell.add_point_record(0);
        cell.update_z_bounds(5.);
        cell.add_point_record(1);
        cell.update_z_bounds(-1.);
        cell.add_point_record(2);
        cell.update_z_bounds(2.);
        assert_eq!(6., cell.z_range());
    }

    #[test]
    fn reload_preserves_counts() {
        let mut cell = IndexCell::default();
        cell.add_point_record(0);
        assert!(cell.increment_point_record(0));
        let points = cell.num_points();
        cell.remove_main_records();
        cell.reset_num_points();
        cell.add_reloaded_record(0, 2);
        assert_eq!(points, cell.num_points());
    }
}
