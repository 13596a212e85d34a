//! Spatial indexing of point files.
//!
//! A [SpatialIndex] accelerates 3-D region queries over a file's points.
//! The build is a two-pass external sort: pass one streams the file and
//! run-length buckets consecutive point ids per grid cell, spilling to a
//! temp file whenever the in-memory window reaches the memory budget; pass
//! two reloads each cell, subdivides overfilled cells into quadrants (or Z
//! bins when a bin height is configured), and emits size-capped blocks of
//! cell records.
//!
//! ```no_run
//! use hspc::{index::{IndexParams, SpatialIndex}, Bounds, Reader};
//!
//! let reader = Reader::from_path("cloud.hsp").unwrap();
//! let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
//! let ids = index.query(&Bounds::new(0., 0., 0., 100., 100., 50.)).unwrap();
//! ```
//!
//! The index captures the point count and extents of the file it was built
//! from; [validate](SpatialIndex::validate) detects a stale index after the
//! file has changed.

mod cell;
mod iterator;
mod record;
mod temp;

pub use self::iterator::IndexIterator;
pub use self::record::Run;

use self::{
    cell::IndexCell,
    iterator::{FilterContext, IterState},
    record::{BlockBuilder, CellPayload, CellRecord, IndexBlock},
    temp::TempBuckets,
};
use crate::{Bounds, Error, Reader, Result, Writer};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// The default in-memory window for pass one.
pub const MAX_MEMORY_DEFAULT: usize = 10 * 1024 * 1024;

/// The smallest allowed in-memory window.
pub const MIN_MEMORY: usize = 1024 * 1024;

/// The target average number of points per cell.
const OPT_POINTS_PER_CELL: u64 = 50;

/// Cells holding more points than this are subdivided.
const MAX_POINTS_PER_CELL: u32 = 1000;

/// The largest allowed total cell count.
const MAX_CELLS: u64 = 250_000;

const INDEX_SIGNATURE: [u8; 4] = *b"HSXI";
const INDEX_VERSION: (u8, u8) = (1, 0);

/// Build and lookup parameters for a spatial index.
#[derive(Clone, Debug)]
pub struct IndexParams {
    /// The memory budget for pass one, clamped to at least [MIN_MEMORY].
    pub max_memory: usize,
    /// The Z bin height; zero disables Z binning.
    pub cell_size_z: f64,
    /// Where to put the temp file; the system temp directory if `None`.
    pub temp_file: Option<PathBuf>,
    /// Rebuild even if a stored index validates.
    pub force_rebuild: bool,
    /// Never rebuild; a stale stored index is an error instead.
    pub read_only: bool,
}

impl Default for IndexParams {
    fn default() -> IndexParams {
        IndexParams {
            max_memory: MAX_MEMORY_DEFAULT,
            cell_size_z: 0.,
            temp_file: None,
            force_rebuild: false,
            read_only: false,
        }
    }
}

/// A grid index over one point file's records.
pub struct SpatialIndex<R: Read + Seek> {
    reader: Reader<R>,
    bounds: Bounds,
    point_count: u64,
    cells_x: u32,
    cells_y: u32,
    cells_z: u32,
    cell_size_x: f64,
    cell_size_y: f64,
    cell_size_z: f64,
    blocks: Vec<IndexBlock>,
}

impl<R: Read + Seek> SpatialIndex<R> {
    /// Builds an index over the reader's points.
    pub fn build(reader: Reader<R>, params: &IndexParams) -> Result<SpatialIndex<R>> {
        let mut index = SpatialIndex::empty(reader);
        index.build_index(params)?;
        Ok(index)
    }

    /// Loads a standalone index file, rebuilding it if it is stale.
    ///
    /// A stale or missing index is rebuilt and re-saved unless the
    /// parameters say read-only, in which case it is an error.
    pub fn load<P: AsRef<Path>>(
        reader: Reader<R>,
        path: P,
        params: &IndexParams,
    ) -> Result<SpatialIndex<R>> {
        let mut index = SpatialIndex::empty(reader);
        let loaded = match File::open(path.as_ref()) {
            Ok(file) => match index.read_index_from(BufReader::new(file)) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("could not read index {:?}: {err}", path.as_ref());
                    false
                }
            },
            Err(_) => false,
        };
        if loaded && !params.force_rebuild && index.validate() {
            return Ok(index);
        }
        if params.read_only {
            return Err(Error::StaleIndex);
        }
        if loaded {
            log::debug!("stored index is out of date, rebuilding");
        }
        index.build_index(params)?;
        index.save(path)?;
        Ok(index)
    }

    /// Loads an index embedded at the tail of a re-saved point file.
    ///
    /// Embedded indexes are read-only: a stale one is an error.
    pub fn load_embedded(mut read: R) -> Result<SpatialIndex<R>> {
        let end = read.seek(SeekFrom::End(0))?;
        if end < 12 {
            return Err(Error::InvalidPointData(
                "stream too short for an embedded index".to_string(),
            ));
        }
        let _ = read.seek(SeekFrom::Start(end - 12))?;
        let offset = read.read_u64::<LittleEndian>()?;
        let mut magic = [0; 4];
        read.read_exact(&mut magic)?;
        if magic != INDEX_SIGNATURE {
            return Err(Error::InvalidPointData(
                "no embedded index trailer".to_string(),
            ));
        }
        let _ = read.seek(SeekFrom::Start(offset))?;
        let mut meta_read = read;
        let mut blocks_holder = SpatialIndexMeta::read_from(&mut meta_read)?;
        let _ = meta_read.seek(SeekFrom::Start(0))?;
        let reader = Reader::new(meta_read)?;
        let mut index = SpatialIndex::empty(reader);
        index.apply_meta(&mut blocks_holder);
        if !index.validate() {
            return Err(Error::StaleIndex);
        }
        Ok(index)
    }

    /// Saves this index as a standalone file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut write = BufWriter::new(File::create(path)?);
        self.write_index_to(&mut write)?;
        write.flush()?;
        Ok(())
    }

    /// Re-saves the point file into `write` and appends this index to it.
    ///
    /// The tail carries a pointer back to the index so
    /// [load_embedded](Self::load_embedded) can find it.
    pub fn save_embedded<W: Write + Seek>(&mut self, write: W) -> Result<W> {
        let header = self.reader.header().clone();
        let with_waveform = header.has_waveform_data();
        let mut writer = Writer::new(write, header)?;
        self.reader.reset();
        while self.reader.read_next_point(with_waveform)? {
            let mut point = self.reader.point().clone();
            writer.write_point(&mut point)?;
        }
        let mut write = writer.into_inner()?;
        let index_offset = write.seek(SeekFrom::End(0))?;
        self.write_index_to(&mut write)?;
        write.write_u64::<LittleEndian>(index_offset)?;
        write.write_all(&INDEX_SIGNATURE)?;
        Ok(write)
    }

    /// Is this index still a faithful description of the file?
    ///
    /// The captured point count and extents must equal the current header's.
    pub fn validate(&self) -> bool {
        self.point_count == self.reader.header().number_of_point_records()
            && self.bounds == self.reader.header().bounds()
    }

    /// Returns every point id inside the query box, unordered.
    pub fn query(&mut self, query: &Bounds) -> Result<Vec<u32>> {
        let mut iterator = self.iter(*query, u32::MAX);
        let ids = iterator.next_chunk()?.to_vec();
        Ok(ids)
    }

    /// Returns an iterator over the points inside the query box, yielding
    /// up to `chunk_size` ids per call.
    pub fn iter(&mut self, query: Bounds, chunk_size: u32) -> IndexIterator<'_, R> {
        IndexIterator::new(self, query, chunk_size)
    }

    /// Returns the indexed extents.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Returns the indexed point count.
    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    /// Returns the cell counts of the grid.
    pub fn cell_counts(&self) -> (u32, u32, u32) {
        (self.cells_x, self.cells_y, self.cells_z)
    }

    /// Consumes the index, returning its reader.
    pub fn into_reader(self) -> Reader<R> {
        self.reader
    }

    pub(crate) fn cells_x(&self) -> u32 {
        self.cells_x
    }

    pub(crate) fn cells_y(&self) -> u32 {
        self.cells_y
    }

    pub(crate) fn cells_z(&self) -> u32 {
        self.cells_z
    }

    pub(crate) fn range_x(&self) -> f64 {
        self.bounds.max.x - self.bounds.min.x
    }

    pub(crate) fn range_y(&self) -> f64 {
        self.bounds.max.y - self.bounds.min.y
    }

    pub(crate) fn range_z(&self) -> f64 {
        self.bounds.max.z - self.bounds.min.z
    }

    fn empty(reader: Reader<R>) -> SpatialIndex<R> {
        SpatialIndex {
            reader,
            bounds: Bounds::default(),
            point_count: 0,
            cells_x: 0,
            cells_y: 0,
            cells_z: 1,
            cell_size_x: 0.,
            cell_size_y: 0.,
            cell_size_z: 0.,
            blocks: Vec::new(),
        }
    }

    fn build_index(&mut self, params: &IndexParams) -> Result<()> {
        let max_memory = params.max_memory.max(MIN_MEMORY);
        self.point_count = self.reader.header().number_of_point_records();
        self.bounds = self.reader.header().bounds();
        if !(self.bounds.max.x > self.bounds.min.x && self.bounds.max.y > self.bounds.min.y) {
            return Err(Error::InvalidPointData(
                "the file's xy extents span no area, no index is possible".to_string(),
            ));
        }
        self.cell_size_z = params.cell_size_z;
        self.cells_z = if self.cell_size_z > 0. {
            ((self.range_z() / self.cell_size_z).ceil() as u32).max(1)
        } else {
            1
        };

        let x_ratio = if self.range_x() >= self.range_y() {
            1.
        } else {
            self.range_x() / self.range_y()
        };
        let y_ratio = if self.range_y() >= self.range_x() {
            1.
        } else {
            self.range_y() / self.range_x()
        };
        let per_axis = ((self.point_count / OPT_POINTS_PER_CELL) as f64).sqrt().max(10.);
        self.cells_x = ((x_ratio * per_axis) as u32).max(1);
        self.cells_y = ((y_ratio * per_axis) as u32).max(1);
        let mut total_cells = u64::from(self.cells_x) * u64::from(self.cells_y);
        if total_cells > MAX_CELLS {
            let reduction = (MAX_CELLS as f64 / total_cells as f64).sqrt();
            self.cells_x = ((f64::from(self.cells_x) * reduction) as u32).max(1);
            self.cells_y = ((f64::from(self.cells_y) * reduction) as u32).max(1);
            total_cells = u64::from(self.cells_x) * u64::from(self.cells_y);
        }
        self.cell_size_x = self.range_x() / f64::from(self.cells_x);
        self.cell_size_y = self.range_y() / f64::from(self.cells_y);

        log::debug!(
            "indexing {} points into a {} x {} x {} cell matrix",
            self.point_count,
            self.cells_x,
            self.cells_y,
            self.cells_z
        );

        let mut cells: Vec<IndexCell> = std::iter::repeat_with(IndexCell::default)
            .take(total_cells as usize)
            .collect();
        let mut temp = TempBuckets::create(params.temp_file.clone(), total_cells)?;
        let result = self.run_passes(&mut cells, &mut temp, max_memory);
        temp.close_and_remove();
        result
    }

    fn run_passes(
        &mut self,
        cells: &mut [IndexCell],
        temp: &mut TempBuckets,
        max_memory: usize,
    ) -> Result<()> {
        // pass 1: stream and bucket
        self.reader.reset();
        let max_points_in_memory = (max_memory / std::mem::size_of::<IndexCell>()).max(1);
        let mut points_in_memory = 0;
        let mut last_cell = None;
        let mut last_point_id = 0;
        let mut point_id: u32 = 0;
        while self.reader.read_next_point(false)? {
            let (x, y, z) = {
                let point = self.reader.point();
                (point.x(), point.y(), point.z())
            };
            let (cell_x, cell_y) = self.identify_cell(x, y)?;
            let index = (cell_x * self.cells_y + cell_y) as usize;
            let extended =
                last_cell == Some(index) && cells[index].increment_point_record(last_point_id);
            if !extended {
                if points_in_memory >= max_points_in_memory {
                    temp.purge(cells)?;
                    points_in_memory = 0;
                }
                cells[index].add_point_record(point_id);
                last_point_id = point_id;
                last_cell = Some(index);
                points_in_memory += 1;
            }
            cells[index].update_z_bounds(z);
            point_id += 1;
        }
        temp.purge(cells)?;
        if log::log_enabled!(log::Level::Debug) {
            log_cell_stats(cells);
        }

        // pass 2: consolidate, subdivide, emit
        let mut builder = BlockBuilder::default();
        let mut indexed: u64 = 0;
        for cell_x in 0..self.cells_x {
            for cell_y in 0..self.cells_y {
                let index = (cell_x * self.cells_y + cell_y) as usize;
                temp.load_cell(&mut cells[index], index as u64)?;
                let z_range = cells[index].z_range();
                let needs_z_bins = self.cells_z > 1 && z_range > self.cell_size_z;
                if needs_z_bins || cells[index].num_points() > MAX_POINTS_PER_CELL {
                    self.subdivide(&mut cells[index], cell_x, cell_y, needs_z_bins)?;
                }
                indexed += u64::from(cells[index].num_points());
                builder.push(CellRecord::from_cell(&cells[index], cell_x, cell_y));
                cells[index].remove_all_records();
            }
        }
        self.blocks = builder.finish();
        if indexed < self.point_count {
            log::warn!("{indexed} of {} points were indexed", self.point_count);
        }
        Ok(())
    }

    /// Redistributes a cell's runs into Z bins or quadrant sub-cells.
    fn subdivide(
        &mut self,
        cell: &mut IndexCell,
        cell_x: u32,
        cell_y: u32,
        use_z_bins: bool,
    ) -> Result<()> {
        let runs: Vec<(u32, u8)> = cell
            .records()
            .iter()
            .map(|(&first, &count)| (first, count))
            .collect();
        for (first, count) in runs {
            self.reader.seek(u64::from(first))?;
            let mut last_group = None;
            let mut group_first = first;
            for tested in 0..u32::from(count) {
                if !self.reader.read_next_point(false)? {
                    return Err(Error::InvalidPointData(
                        "file ended inside an indexed run".to_string(),
                    ));
                }
                let (x, y, z) = {
                    let point = self.reader.point();
                    (point.x(), point.y(), point.z())
                };
                let group = if use_z_bins {
                    self.identify_cell_z(z)?
                } else {
                    self.identify_sub_cell(x, y, cell_x, cell_y)
                };
                let extended = last_group == Some(group)
                    && if use_z_bins {
                        cell.increment_z_cell(group, group_first)
                    } else {
                        cell.increment_sub_cell(group, group_first)
                    };
                if !extended {
                    group_first = first + tested;
                    if use_z_bins {
                        cell.add_z_cell(group, group_first);
                    } else {
                        cell.add_sub_cell(group, group_first);
                    }
                    last_group = Some(group);
                }
            }
        }
        cell.remove_main_records();
        Ok(())
    }

    fn identify_cell(&self, x: f64, y: f64) -> Result<(u32, u32)> {
        Ok((
            cell_of(
                (x - self.bounds.min.x) / self.range_x(),
                self.cells_x,
            )?,
            cell_of(
                (y - self.bounds.min.y) / self.range_y(),
                self.cells_y,
            )?,
        ))
    }

    fn identify_cell_z(&self, z: f64) -> Result<u32> {
        if self.range_z() > 0. {
            cell_of((z - self.bounds.min.z) / self.range_z(), self.cells_z)
        } else {
            Ok(0)
        }
    }

    /// Quadrants: 0 SW, 1 SE, 2 NW, 3 NE.
    fn identify_sub_cell(&self, x: f64, y: f64, cell_x: u32, cell_y: u32) -> u32 {
        let cell_min_x = self.bounds.min.x + f64::from(cell_x) * self.cell_size_x;
        let cell_min_y = self.bounds.min.y + f64::from(cell_y) * self.cell_size_y;
        let high_x = (x - cell_min_x) / self.cell_size_x > 0.5;
        let high_y = (y - cell_min_y) / self.cell_size_y > 0.5;
        match (high_x, high_y) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    /// Walks cells from the iterator position, collecting conforming ids.
    pub(crate) fn filter_into(
        &mut self,
        ctx: &FilterContext,
        chunk_size: u32,
        state: &mut IterState,
        result: &mut Vec<u32>,
    ) -> Result<()> {
        result.clear();
        while state.cur_block < self.blocks.len() {
            while state.cur_cell < self.blocks[state.cur_block].cells.len() {
                let cell = self.blocks[state.cur_block].cells[state.cur_cell].clone();
                let cell_done = self.filter_cell(&cell, ctx, chunk_size, state, result)?;
                if !cell_done {
                    return Ok(());
                }
                state.cur_cell += 1;
                state.pts_scanned_cur_cell = 0;
            }
            state.cur_block += 1;
            state.cur_cell = 0;
        }
        Ok(())
    }

    /// Scans one cell, resuming mid-cell when a previous chunk stopped
    /// inside it. Returns false when the chunk filled before the cell was
    /// exhausted.
    fn filter_cell(
        &mut self,
        cell: &CellRecord,
        ctx: &FilterContext,
        chunk_size: u32,
        state: &mut IterState,
        result: &mut Vec<u32>,
    ) -> Result<bool> {
        if !ctx.cell_interesting(cell.x, cell.y) {
            return Ok(true);
        }
        let mut scan = CellScan {
            scanned: 0,
            ignore: state.pts_scanned_cur_cell,
            last_id: None,
            last_read: false,
        };
        // z membership of a flat cell is only known when there is a single
        // z bin; otherwise each border point is tested individually
        let flat_z = if self.cells_z == 1 { Some(0) } else { None };
        match &cell.payload {
            CellPayload::Flat(runs) => self.filter_runs(
                cell, flat_z, runs, ctx, chunk_size, state, result, &mut scan,
            ),
            CellPayload::SubCells(groups) => {
                for (sub_cell, runs) in groups {
                    if !ctx.sub_cell_interesting(*sub_cell, cell.x, cell.y) {
                        continue;
                    }
                    if !self.filter_runs(
                        cell, flat_z, runs, ctx, chunk_size, state, result, &mut scan,
                    )? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CellPayload::ZCells(groups) => {
                for (z_cell, runs) in groups {
                    if !ctx.z_cell_interesting(*z_cell) {
                        continue;
                    }
                    if !self.filter_runs(
                        cell,
                        Some(*z_cell),
                        runs,
                        ctx,
                        chunk_size,
                        state,
                        result,
                        &mut scan,
                    )? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn filter_runs(
        &mut self,
        cell: &CellRecord,
        z_cell: Option<u32>,
        runs: &[Run],
        ctx: &FilterContext,
        chunk_size: u32,
        state: &mut IterState,
        result: &mut Vec<u32>,
        scan: &mut CellScan,
    ) -> Result<bool> {
        for run in runs {
            for offset in 0..u32::from(run.count) {
                let id = run.first + offset;
                scan.scanned += 1;
                state.total_points_scanned += 1;
                if scan.scanned <= scan.ignore {
                    scan.last_id = Some(id);
                    scan.last_read = false;
                    continue;
                }
                let conforms = self.filter_one_point(ctx, cell.x, cell.y, z_cell, id, scan)?;
                scan.last_id = Some(id);
                if conforms {
                    state.conforming_found += 1;
                    let mut skip = false;
                    if state.advance > 0 {
                        state.advance -= 1;
                        if state.advance > 0 {
                            skip = true;
                        }
                    }
                    if !skip {
                        result.push(id);
                        if result.len() >= chunk_size as usize {
                            state.pts_scanned_cur_cell = scan.scanned;
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    /// Tests one point against the query, reading it from disk only when
    /// its cell straddles the query border.
    fn filter_one_point(
        &mut self,
        ctx: &FilterContext,
        cell_x: u32,
        cell_y: u32,
        z_cell: Option<u32>,
        id: u32,
        scan: &mut CellScan,
    ) -> Result<bool> {
        let mut coords = None;
        let x = i64::from(cell_x);
        let x_good = if ctx.no_filter_x
            || (x >= ctx.low_x_completely_in && x <= ctx.high_x_completely_in)
        {
            true
        } else if x == ctx.low_x_border || x == ctx.high_x_border {
            match self.point_coords(id, scan, &mut coords)? {
                Some((px, _, _)) => px >= ctx.bounds.min.x && px <= ctx.bounds.max.x,
                None => false,
            }
        } else {
            false
        };
        if !x_good {
            return Ok(false);
        }

        let y = i64::from(cell_y);
        let y_good = if ctx.no_filter_y
            || (y >= ctx.low_y_completely_in && y <= ctx.high_y_completely_in)
        {
            true
        } else if y == ctx.low_y_border || y == ctx.high_y_border {
            match self.point_coords(id, scan, &mut coords)? {
                Some((_, py, _)) => py >= ctx.bounds.min.y && py <= ctx.bounds.max.y,
                None => false,
            }
        } else {
            false
        };
        if !y_good {
            return Ok(false);
        }

        if ctx.no_filter_z {
            return Ok(true);
        }
        let z_good = match z_cell {
            Some(z_cell) => {
                let z = i64::from(z_cell);
                if z >= ctx.low_z_completely_in && z <= ctx.high_z_completely_in {
                    true
                } else if z == ctx.low_z_border || z == ctx.high_z_border {
                    match self.point_coords(id, scan, &mut coords)? {
                        Some((_, _, pz)) => pz >= ctx.bounds.min.z && pz <= ctx.bounds.max.z,
                        None => false,
                    }
                } else {
                    false
                }
            }
            None => match self.point_coords(id, scan, &mut coords)? {
                Some((_, _, pz)) => pz >= ctx.bounds.min.z && pz <= ctx.bounds.max.z,
                None => false,
            },
        };
        Ok(z_good)
    }

    /// Reads a point's coordinates, avoiding a seek when it is the
    /// sequential successor of the last point read.
    fn point_coords(
        &mut self,
        id: u32,
        scan: &mut CellScan,
        coords: &mut Option<(f64, f64, f64)>,
    ) -> Result<Option<(f64, f64, f64)>> {
        if coords.is_some() {
            return Ok(*coords);
        }
        let mut read = false;
        if scan.last_read && scan.last_id.map(|last| last + 1 == id).unwrap_or(false) {
            read = self.reader.read_next_point(false)?;
        }
        if !read {
            self.reader.seek(u64::from(id))?;
            read = self.reader.read_next_point(false)?;
        }
        scan.last_read = read;
        if read {
            let point = self.reader.point();
            *coords = Some((point.x(), point.y(), point.z()));
            Ok(*coords)
        } else {
            Ok(None)
        }
    }

    fn write_index_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_all(&INDEX_SIGNATURE)?;
        write.write_u8(INDEX_VERSION.0)?;
        write.write_u8(INDEX_VERSION.1)?;
        write.write_u64::<LittleEndian>(self.point_count)?;
        for value in [
            self.bounds.min.x,
            self.bounds.min.y,
            self.bounds.min.z,
            self.bounds.max.x,
            self.bounds.max.y,
            self.bounds.max.z,
        ] {
            write.write_f64::<LittleEndian>(value)?;
        }
        write.write_u32::<LittleEndian>(self.cells_x)?;
        write.write_u32::<LittleEndian>(self.cells_y)?;
        write.write_u32::<LittleEndian>(self.cells_z)?;
        write.write_f64::<LittleEndian>(self.cell_size_z)?;
        write.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            write.write_u32::<LittleEndian>(block.cells.len() as u32)?;
            for cell in &block.cells {
                cell.write_to(&mut write)?;
            }
        }
        Ok(())
    }

    fn read_index_from<R2: Read>(&mut self, mut read: R2) -> Result<()> {
        let mut meta = SpatialIndexMeta::read_from(&mut read)?;
        self.apply_meta(&mut meta);
        Ok(())
    }

    fn apply_meta(&mut self, meta: &mut SpatialIndexMeta) {
        self.point_count = meta.point_count;
        self.bounds = meta.bounds;
        self.cells_x = meta.cells_x;
        self.cells_y = meta.cells_y;
        self.cells_z = meta.cells_z;
        self.cell_size_z = meta.cell_size_z;
        self.cell_size_x = self.range_x() / f64::from(self.cells_x.max(1));
        self.cell_size_y = self.range_y() / f64::from(self.cells_y.max(1));
        self.blocks = std::mem::take(&mut meta.blocks);
    }
}

impl<R: Read + Seek> std::fmt::Debug for SpatialIndex<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("point_count", &self.point_count)
            .field("cells_x", &self.cells_x)
            .field("cells_y", &self.cells_y)
            .field("cells_z", &self.cells_z)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

/// The serialized portion of an index, before it is attached to a reader.
struct SpatialIndexMeta {
    point_count: u64,
    bounds: Bounds,
    cells_x: u32,
    cells_y: u32,
    cells_z: u32,
    cell_size_z: f64,
    blocks: Vec<IndexBlock>,
}

impl SpatialIndexMeta {
    fn read_from<R: Read>(mut read: R) -> Result<SpatialIndexMeta> {
        let mut signature = [0; 4];
        read.read_exact(&mut signature)?;
        if signature != INDEX_SIGNATURE {
            return Err(Error::InvalidPointData(
                "bad spatial index signature".to_string(),
            ));
        }
        let major = read.read_u8()?;
        let minor = read.read_u8()?;
        if (major, minor) != INDEX_VERSION {
            return Err(Error::InvalidPointData(format!(
                "unsupported spatial index version {major}.{minor}"
            )));
        }
        let point_count = read.read_u64::<LittleEndian>()?;
        let mut extents = [0.; 6];
        for value in &mut extents {
            *value = read.read_f64::<LittleEndian>()?;
        }
        let cells_x = read.read_u32::<LittleEndian>()?;
        let cells_y = read.read_u32::<LittleEndian>()?;
        let cells_z = read.read_u32::<LittleEndian>()?;
        let cell_size_z = read.read_f64::<LittleEndian>()?;
        let block_count = read.read_u32::<LittleEndian>()?;
        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let cell_count = read.read_u32::<LittleEndian>()?;
            let mut cells = Vec::with_capacity(cell_count as usize);
            for _ in 0..cell_count {
                cells.push(CellRecord::read_from(&mut read)?);
            }
            blocks.push(IndexBlock { cells });
        }
        Ok(SpatialIndexMeta {
            point_count,
            bounds: Bounds::new(
                extents[0], extents[1], extents[2], extents[3], extents[4], extents[5],
            ),
            cells_x,
            cells_y,
            cells_z,
            cell_size_z,
            blocks,
        })
    }
}

/// Per-cell scan bookkeeping during a filter walk.
struct CellScan {
    scanned: u64,
    ignore: u64,
    last_id: Option<u32>,
    last_read: bool,
}

const CELL_STATS_BINS: usize = 20;

/// Logs a population histogram of the cell matrix.
fn log_cell_stats(cells: &[IndexCell]) {
    let max_points = cells.iter().map(IndexCell::num_points).max().unwrap_or(0);
    log::debug!("max points per cell {max_points}");
    if max_points == 0 {
        return;
    }
    let mut population = [0u32; CELL_STATS_BINS];
    for cell in cells {
        let bin = (CELL_STATS_BINS * cell.num_points() as usize / max_points as usize)
            .min(CELL_STATS_BINS - 1);
        population[bin] += 1;
    }
    for (bin, count) in population.iter().enumerate() {
        log::debug!(
            "bin {bin:2} ({}-{})... cells in point range bin {count}",
            bin as u32 * max_points / CELL_STATS_BINS as u32,
            (bin as u32 + 1) * max_points / CELL_STATS_BINS as u32,
        );
    }
}

fn cell_of(offset: f64, cells: u32) -> Result<u32> {
    if (0. ..1.).contains(&offset) {
        Ok((offset * f64::from(cells)) as u32)
    } else if (offset - 1.).abs() <= 4. * f64::EPSILON {
        Ok(cells - 1)
    } else {
        Err(Error::InvalidPointData(
            "point lies outside the indexed bounds".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_edges() {
        assert_eq!(0, cell_of(0., 10).unwrap());
        assert_eq!(9, cell_of(0.95, 10).unwrap());
        assert_eq!(9, cell_of(1., 10).unwrap());
        assert!(cell_of(1.5, 10).is_err());
        assert!(cell_of(-0.1, 10).is_err());
    }
}
