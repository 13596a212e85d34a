//! External-memory bucketing for the index builder.
//!
//! When the in-memory cell window reaches the memory budget, every cell's
//! runs are appended to a temp file as a block `(forward pointer, record
//! count, records...)`. The file starts with one u64 slot per cell holding
//! the offset of that cell's first block; blocks chain through their
//! forward pointers, so pass two can reload any cell with a walk of its
//! list. The temp file is removed when the build finishes or fails.

use super::cell::IndexCell;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::{File, OpenOptions},
    io::{BufReader, Read, Seek, SeekFrom, Write},
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
};

/// The per-cell bucket store backing pass one.
#[derive(Debug)]
pub(crate) struct TempBuckets {
    file: Option<File>,
    path: PathBuf,
    total_cells: u64,
    written_bytes: u64,
    started: bool,
}

impl TempBuckets {
    /// Creates the store, choosing a path in the system temp directory if
    /// none was supplied.
    pub(crate) fn create(path: Option<PathBuf>, total_cells: u64) -> Result<TempBuckets> {
        let path = path.unwrap_or_else(default_temp_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(TempBuckets {
            file: Some(file),
            path,
            total_cells,
            written_bytes: 0,
            started: false,
        })
    }

    /// Appends every cell's in-memory runs to its chain and clears them.
    pub(crate) fn purge(&mut self, cells: &mut [IndexCell]) -> Result<()> {
        let total_cells = self.total_cells;
        if !self.started {
            let file = self.file_mut()?;
            for _ in 0..total_cells {
                file.write_u64::<LittleEndian>(0)?;
            }
            self.written_bytes = total_cells * 8;
            self.started = true;
        }
        for (index, cell) in cells.iter_mut().enumerate() {
            if cell.num_records() == 0 {
                continue;
            }
            let pointer_slot = if cell.file_offset == 0 {
                index as u64 * 8
            } else {
                cell.file_offset
            };
            let next_block = self.written_bytes;
            let file = self.file_mut()?;
            let _ = file.seek(SeekFrom::Start(pointer_slot))?;
            file.write_u64::<LittleEndian>(next_block)?;
            cell.file_offset = next_block;

            let _ = file.seek(SeekFrom::End(0))?;
            file.write_u64::<LittleEndian>(0)?;
            file.write_u32::<LittleEndian>(cell.num_records() as u32)?;
            for (&first, &count) in cell.records() {
                file.write_u32::<LittleEndian>(first)?;
                file.write_u8(count)?;
            }
            self.written_bytes += 8 + 4 + cell.num_records() as u64 * 5;
            cell.remove_main_records();
        }
        self.file_mut()?.flush()?;
        Ok(())
    }

    /// Reloads one cell's runs by walking its chain.
    ///
    /// The reloaded point count must match what pass one accumulated.
    pub(crate) fn load_cell(&mut self, cell: &mut IndexCell, index: u64) -> Result<()> {
        let former = cell.num_points();
        cell.reset_num_points();
        if !self.started {
            // nothing was ever purged; an empty cell is consistent
            if former != 0 {
                return Err(Error::InvalidPointData(
                    "index temp file holds no data for a non-empty cell".to_string(),
                ));
            }
            return Ok(());
        }
        let file = self.file_mut()?;
        let _ = file.seek(SeekFrom::Start(index * 8))?;
        let mut offset = file.read_u64::<LittleEndian>()?;
        let mut reader = BufReader::new(&mut *file);
        while offset > 0 {
            let _ = reader.seek(SeekFrom::Start(offset))?;
            offset = reader.read_u64::<LittleEndian>()?;
            let count = reader.read_u32::<LittleEndian>()?;
            for _ in 0..count {
                let first = reader.read_u32::<LittleEndian>()?;
                let consecutive = reader.read_u8()?;
                cell.add_reloaded_record(first, consecutive);
            }
        }
        if cell.num_points() != former {
            return Err(Error::InvalidPointData(format!(
                "index cell checksum mismatch: reloaded {} of {} points",
                cell.num_points(),
                former
            )));
        }
        Ok(())
    }

    /// Closes and removes the temp file.
    pub(crate) fn close_and_remove(&mut self) {
        if self.file.take().is_some() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                log::warn!("could not remove index temp file {:?}: {err}", self.path);
            }
        }
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::InvalidPointData("index temp file is closed".to_string()))
    }
}

impl Drop for TempBuckets {
    fn drop(&mut self) {
        self.close_and_remove();
    }
}

fn default_temp_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("hspc-index-{}-{n}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_and_reload() {
        let mut cells = vec![IndexCell::default(), IndexCell::default()];
        cells[0].add_point_record(0);
        assert!(cells[0].increment_point_record(0));
        cells[1].add_point_record(2);

        let mut buckets = TempBuckets::create(None, 2).unwrap();
        buckets.purge(&mut cells).unwrap();
        assert_eq!(0, cells[0].num_records());

        // second window for cell 0
        cells[0].add_point_record(3);
        buckets.purge(&mut cells).unwrap();

        buckets.load_cell(&mut cells[0], 0).unwrap();
        assert_eq!(3, cells[0].num_points());
        let runs: Vec<_> = cells[0]
            .records()
            .iter()
            .map(|(&first, &count)| (first, count))
            .collect();
        assert_eq!(vec![(0, 2), (3, 1)], runs);

        buckets.load_cell(&mut cells[1], 1).unwrap();
        assert_eq!(1, cells[1].num_points());
    }
}
