//! Read HSPCD points.
//!
//! A [Reader] deserializes the header up front and then yields points
//! sequentially or by index. The same point buffer is reused across reads:
//!
//! ```no_run
//! use hspc::Reader;
//!
//! let mut reader = Reader::from_path("cloud.hsp").unwrap();
//! while reader.read_next_point(false).unwrap() {
//!     let point = reader.point();
//!     println!("{} {} {}", point.x(), point.y(), point.z());
//! }
//! ```
//!
//! If you're reading any significant number of points from a file, use a
//! `BufRead`; `Reader::from_path` does this for you.

use crate::{
    filter::{PointFilter, PointTransform},
    srs::SpatialReference,
    Error, Header, Point, Result,
};
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

/// Takes bytes and turns them into points and associated metadata.
pub struct Reader<R> {
    read: R,
    start: u64,
    header: Arc<Header>,
    srs: SpatialReference,
    point: Point,
    current: u64,
    size: u64,
    record_size: usize,
    filters: Vec<Box<dyn PointFilter>>,
    transforms: Vec<Box<dyn PointTransform>>,
    need_header_check: bool,
}

impl<R: Read + Seek> Reader<R> {
    /// Creates a reader, deserializing the header from the stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Header, Reader, Writer};
    /// use std::io::Cursor;
    ///
    /// let writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
    /// let cursor = writer.into_inner().unwrap();
    /// let reader = Reader::new(cursor).unwrap();
    /// assert_eq!(0, reader.header().number_of_point_records());
    /// ```
    pub fn new(mut read: R) -> Result<Reader<R>> {
        let start = read.stream_position()?;
        let header = Arc::new(Header::read_from(&mut read)?);
        let point = Point::new(header.clone());
        let size = header.number_of_point_records();
        let record_size = header.data_record_length();
        Ok(Reader {
            read,
            start,
            header,
            srs: SpatialReference::default(),
            point,
            current: 0,
            size,
            record_size,
            filters: Vec::new(),
            transforms: Vec::new(),
            need_header_check: false,
        })
    }

    /// Returns this reader's header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a shared handle to this reader's header.
    pub fn shared_header(&self) -> Arc<Header> {
        self.header.clone()
    }

    /// Returns the georeference.
    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    /// Sets the georeference.
    pub fn set_srs(&mut self, srs: SpatialReference) {
        self.srs = srs;
    }

    /// Returns the last point read.
    ///
    /// The buffer is reused; copy the point if it must outlive the next
    /// read.
    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Installs the filter chain.
    pub fn set_filters(&mut self, filters: Vec<Box<dyn PointFilter>>) {
        self.filters = filters;
    }

    /// Installs the transform chain.
    ///
    /// Transforms are allowed to rebind the point's header; if any declares
    /// that it does, subsequent reads re-check the binding.
    pub fn set_transforms(&mut self, transforms: Vec<Box<dyn PointTransform>>) {
        self.need_header_check = transforms.iter().any(|t| t.modifies_header());
        self.transforms = transforms;
    }

    /// Resets the cursor to the beginning of the point records.
    pub fn reset(&mut self) {
        self.current = 0;
        self.size = self.header.number_of_point_records();
        self.record_size = self.header.data_record_length();
    }

    /// Reads the next point that passes the filter chain.
    ///
    /// Returns false at the end of the records. When `with_waveform` is
    /// true, the point's waveform payload is read from its recorded byte
    /// offset and the cursor restored.
    pub fn read_next_point(&mut self, with_waveform: bool) -> Result<bool> {
        if self.current == 0 {
            let _ = self
                .read
                .seek(SeekFrom::Start(self.start + self.header.point_data_offset()))?;
        }
        loop {
            if self.current >= self.size {
                return Ok(false);
            }
            if self.need_header_check && !Arc::ptr_eq(self.point.header(), &self.header) {
                self.point.set_header(self.header.clone())?;
            }
            match self.read.read_exact(self.point.data_mut()) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(false),
                Err(err) => return Err(err.into()),
            }
            self.current += 1;
            if self.filters.iter().all(|filter| filter.keep(&self.point)) {
                break;
            }
        }
        for transform in &self.transforms {
            transform.transform(&mut self.point);
        }
        if with_waveform {
            self.read_waveform_data()?;
        }
        Ok(true)
    }

    /// Reads the point at index `n`.
    pub fn read_point_at(&mut self, n: u64, with_waveform: bool) -> Result<&Point> {
        if n >= self.size {
            return Err(Error::PointOutOfRange {
                index: n,
                count: self.size,
            });
        }
        let position =
            self.start + self.header.point_data_offset() + n * self.record_size as u64;
        let _ = self.read.seek(SeekFrom::Start(position))?;
        if self.need_header_check && !Arc::ptr_eq(self.point.header(), &self.header) {
            self.point.set_header(self.header.clone())?;
        }
        self.read.read_exact(self.point.data_mut())?;
        self.current = n + 1;
        for transform in &self.transforms {
            transform.transform(&mut self.point);
        }
        if with_waveform {
            self.read_waveform_data()?;
        }
        Ok(&self.point)
    }

    /// Positions the cursor so the next read returns point `n`.
    pub fn seek(&mut self, n: u64) -> Result<()> {
        if n >= self.size {
            return Err(Error::PointOutOfRange {
                index: n,
                count: self.size,
            });
        }
        let position =
            self.start + self.header.point_data_offset() + n * self.record_size as u64;
        let _ = self.read.seek(SeekFrom::Start(position))?;
        self.current = n;
        Ok(())
    }

    fn read_waveform_data(&mut self) -> Result<()> {
        if !self.header.has_waveform_data() {
            return Ok(());
        }
        let offset = self.point.waveform_data_byte_offset()?;
        let size = self.point.waveform_data_size()?;
        if size == 0 {
            self.point.waveform_data_mut().clear();
            return Ok(());
        }
        let previous = self.read.stream_position()?;
        let _ = self.read.seek(SeekFrom::Start(self.start + offset))?;
        self.point
            .waveform_data_mut()
            .resize(size as usize, 0);
        self.read.read_exact(self.point.waveform_data_mut())?;
        let _ = self.read.seek(SeekFrom::Start(previous))?;
        Ok(())
    }
}

impl Reader<BufReader<File>> {
    /// Creates a reader for a file path, loading any `.prj` companion.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hspc::Reader;
    /// let reader = Reader::from_path("cloud.hsp").unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<BufReader<File>>> {
        let file = File::open(path.as_ref())?;
        let mut reader = Reader::new(BufReader::new(file))?;
        if let Some(srs) = SpatialReference::from_companion(path.as_ref())? {
            reader.srs = srs;
        }
        Ok(reader)
    }
}

impl<R> std::fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("current", &self.current)
            .field("size", &self.size)
            .field("record_size", &self.record_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter::PointFilter, Writer};
    use std::io::Cursor;

    fn file_with_points(zs: &[f64]) -> Cursor<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
        for &z in zs {
            let mut point = Point::default();
            point.set_coordinates(1., 2., z).unwrap();
            writer.write_point(&mut point).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn sequential_read() {
        let mut reader = Reader::new(file_with_points(&[1., 2., 3.])).unwrap();
        let mut zs = Vec::new();
        while reader.read_next_point(false).unwrap() {
            zs.push(reader.point().z());
        }
        assert_eq!(vec![1., 2., 3.], zs);
    }

    #[test]
    fn read_point_at() {
        let mut reader = Reader::new(file_with_points(&[1., 2., 3.])).unwrap();
        let point = reader.read_point_at(2, false).unwrap();
        assert_eq!(3., point.z());
        assert!(reader.read_point_at(3, false).is_err());
    }

    #[test]
    fn seek_then_read() {
        let mut reader = Reader::new(file_with_points(&[1., 2., 3.])).unwrap();
        reader.seek(1).unwrap();
        assert!(reader.read_next_point(false).unwrap());
        assert_eq!(2., reader.point().z());
    }

    struct ZAbove(f64);

    impl PointFilter for ZAbove {
        fn keep(&self, point: &Point) -> bool {
            point.z() > self.0
        }
    }

    #[test]
    fn filters_skip_points() {
        let mut reader = Reader::new(file_with_points(&[1., 2., 3., 4.])).unwrap();
        reader.set_filters(vec![Box::new(ZAbove(2.5))]);
        let mut zs = Vec::new();
        while reader.read_next_point(false).unwrap() {
            zs.push(reader.point().z());
        }
        assert_eq!(vec![3., 4.], zs);
    }
}
