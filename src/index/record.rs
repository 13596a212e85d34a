//! Serialized index cells and blocks.
//!
//! The emitted index is a stream of blocks, each holding whole cell
//! records and capped at 64 KiB serialized, mirroring the variable-length
//! record sections the format family uses for auxiliary payloads. A cell
//! record is either flat (runs only), subdivided into quadrant sub-cells,
//! or subdivided into Z bins.

use super::cell::IndexCell;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The serialized size cap of one index block.
pub(crate) const MAX_BLOCK_SIZE: usize = 65_535;

const KIND_FLAT: u8 = 0;
const KIND_SUB_CELLS: u8 = 1;
const KIND_Z_CELLS: u8 = 2;

/// A `(first point id, consecutive count)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    /// The first point id of the run.
    pub first: u32,
    /// How many consecutive points the run covers.
    pub count: u8,
}

/// The payload of one cell record.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CellPayload {
    /// Runs directly on the cell.
    Flat(Vec<Run>),
    /// Runs grouped by quadrant (0 SW, 1 SE, 2 NW, 3 NE).
    SubCells(Vec<(u32, Vec<Run>)>),
    /// Runs grouped by Z bin.
    ZCells(Vec<(u32, Vec<Run>)>),
}

/// One serialized cell.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CellRecord {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) num_points: u32,
    pub(crate) payload: CellPayload,
}

impl CellRecord {
    /// Snapshots an accumulated cell for emission.
    ///
    /// Z bins win over quadrants when both are somehow present.
    pub(crate) fn from_cell(cell: &IndexCell, x: u32, y: u32) -> CellRecord {
        let payload = if !cell.z_cells().is_empty() {
            CellPayload::ZCells(collect_groups(cell.z_cells()))
        } else if !cell.sub_cells().is_empty() {
            CellPayload::SubCells(collect_groups(cell.sub_cells()))
        } else {
            CellPayload::Flat(collect_runs(cell.records()))
        };
        CellRecord {
            x,
            y,
            num_points: cell.num_points(),
            payload,
        }
    }

    /// Returns the serialized size of this record in bytes.
    pub(crate) fn serialized_size(&self) -> usize {
        let payload = match &self.payload {
            CellPayload::Flat(runs) => 4 + runs.len() * 5,
            CellPayload::SubCells(groups) | CellPayload::ZCells(groups) => {
                4 + groups
                    .iter()
                    .map(|(_, runs)| 8 + runs.len() * 5)
                    .sum::<usize>()
            }
        };
        13 + payload
    }

    /// Writes this record.
    pub(crate) fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u32::<LittleEndian>(self.x)?;
        write.write_u32::<LittleEndian>(self.y)?;
        write.write_u32::<LittleEndian>(self.num_points)?;
        match &self.payload {
            CellPayload::Flat(runs) => {
                write.write_u8(KIND_FLAT)?;
                write_runs(&mut write, runs)?;
            }
            CellPayload::SubCells(groups) => {
                write.write_u8(KIND_SUB_CELLS)?;
                write_groups(&mut write, groups)?;
            }
            CellPayload::ZCells(groups) => {
                write.write_u8(KIND_Z_CELLS)?;
                write_groups(&mut write, groups)?;
            }
        }
        Ok(())
    }

    /// Reads a record.
    pub(crate) fn read_from<R: Read>(mut read: R) -> Result<CellRecord> {
        let x = read.read_u32::<LittleEndian>()?;
        let y = read.read_u32::<LittleEndian>()?;
        let num_points = read.read_u32::<LittleEndian>()?;
        let kind = read.read_u8()?;
        let payload = match kind {
            KIND_FLAT => CellPayload::Flat(read_runs(&mut read)?),
            KIND_SUB_CELLS => CellPayload::SubCells(read_groups(&mut read)?),
            KIND_Z_CELLS => CellPayload::ZCells(read_groups(&mut read)?),
            _ => {
                return Err(Error::InvalidPointData(format!(
                    "unknown index cell kind {kind}"
                )))
            }
        };
        Ok(CellRecord {
            x,
            y,
            num_points,
            payload,
        })
    }
}

/// One emitted block of whole cell records.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct IndexBlock {
    pub(crate) cells: Vec<CellRecord>,
}

/// Packs cell records into size-capped blocks.
#[derive(Debug, Default)]
pub(crate) struct BlockBuilder {
    blocks: Vec<IndexBlock>,
    current: IndexBlock,
    current_size: usize,
}

impl BlockBuilder {
    pub(crate) fn push(&mut self, record: CellRecord) {
        let size = record.serialized_size();
        if size > MAX_BLOCK_SIZE {
            log::warn!(
                "index cell ({}, {}) is {} bytes, larger than one block",
                record.x,
                record.y,
                size
            );
        }
        if self.current_size + size > MAX_BLOCK_SIZE && !self.current.cells.is_empty() {
            self.blocks.push(std::mem::take(&mut self.current));
            self.current_size = 0;
        }
        self.current.cells.push(record);
        self.current_size += size;
    }

    pub(crate) fn finish(mut self) -> Vec<IndexBlock> {
        if !self.current.cells.is_empty() {
            self.blocks.push(self.current);
        }
        self.blocks
    }
}

fn collect_runs(runs: &super::cell::RunMap) -> Vec<Run> {
    runs.iter()
        .map(|(&first, &count)| Run { first, count })
        .collect()
}

fn collect_groups(
    groups: &std::collections::BTreeMap<u32, super::cell::RunMap>,
) -> Vec<(u32, Vec<Run>)> {
    groups
        .iter()
        .map(|(&id, runs)| (id, collect_runs(runs)))
        .collect()
}

fn write_runs<W: Write>(write: &mut W, runs: &[Run]) -> Result<()> {
    write.write_u32::<LittleEndian>(runs.len() as u32)?;
    for run in runs {
        write.write_u32::<LittleEndian>(run.first)?;
        write.write_u8(run.count)?;
    }
    Ok(())
}

fn read_runs<R: Read>(read: &mut R) -> Result<Vec<Run>> {
    let count = read.read_u32::<LittleEndian>()?;
    let mut runs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let first = read.read_u32::<LittleEndian>()?;
        let count = read.read_u8()?;
        runs.push(Run { first, count });
    }
    Ok(runs)
}

fn write_groups<W: Write>(write: &mut W, groups: &[(u32, Vec<Run>)]) -> Result<()> {
    write.write_u32::<LittleEndian>(groups.len() as u32)?;
    for (id, runs) in groups {
        write.write_u32::<LittleEndian>(*id)?;
        write_runs(write, runs)?;
    }
    Ok(())
}

fn read_groups<R: Read>(read: &mut R) -> Result<Vec<(u32, Vec<Run>)>> {
    let count = read.read_u32::<LittleEndian>()?;
    let mut groups = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = read.read_u32::<LittleEndian>()?;
        groups.push((id, read_runs(read)?));
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: CellPayload) -> CellRecord {
        CellRecord {
            x: 1,
            y: 2,
            num_points: 7,
            payload,
        }
    }

    #[test]
    fn flat_round_trip() {
        let record = record(CellPayload::Flat(vec![
            Run { first: 0, count: 3 },
            Run { first: 10, count: 4 },
        ]));
        let mut bytes = Vec::new();
        record.write_to(&mut bytes).unwrap();
        assert_eq!(record.serialized_size(), bytes.len());
        assert_eq!(record, CellRecord::read_from(bytes.as_slice()).unwrap());
    }

    #[test]
    fn grouped_round_trip() {
        let record = record(CellPayload::ZCells(vec![
            (0, vec![Run { first: 0, count: 2 }]),
            (3, vec![Run { first: 5, count: 5 }]),
        ]));
        let mut bytes = Vec::new();
        record.write_to(&mut bytes).unwrap();
        assert_eq!(record.serialized_size(), bytes.len());
        assert_eq!(record, CellRecord::read_from(bytes.as_slice()).unwrap());
    }

    #[test]
    fn blocks_are_size_capped() {
        let mut builder = BlockBuilder::default();
        for i in 0..100 {
            let runs = (0..2000)
                .map(|j| Run {
                    first: j,
                    count: 1,
                })
                .collect();
            builder.push(CellRecord {
                x: i,
                y: 0,
                num_points: 2000,
                payload: CellPayload::Flat(runs),
            });
        }
        let blocks = builder.finish();
        assert!(blocks.len() > 1);
        for block in &blocks {
            let size: usize = block.cells.iter().map(CellRecord::serialized_size).sum();
            assert!(size <= MAX_BLOCK_SIZE || block.cells.len() == 1);
        }
    }
}
