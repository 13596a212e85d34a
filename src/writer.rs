//! Write HSPCD points.
//!
//! A [Writer] serializes its header on construction and then streams fixed
//! point records. When the header declares inline waveform data, the file
//! is pre-extended past the full record region so waveform payloads can be
//! appended while records are still being written:
//!
//! ```
//! use hspc::{Header, Point, Writer};
//! use std::io::Cursor;
//!
//! let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
//! let mut point = Point::default();
//! point.set_coordinates(1., 2., 3.).unwrap();
//! writer.write_point(&mut point).unwrap();
//! writer.close().unwrap();
//! ```
//!
//! The point count (and the grown extents) are rewritten into the header
//! when the writer closes; for convenience this also happens on drop.

use crate::{
    raw,
    srs::SpatialReference,
    Error, Header, Point, Result,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Writes points to a stream.
pub struct Writer<W: Write + Seek> {
    write: Option<W>,
    start: u64,
    header: Header,
    srs: SpatialReference,
    prj_path: Option<PathBuf>,
    point_count: u64,
    expected_point_count: u64,
    waveform_tail: u64,
    closed: bool,
}

impl<W: Write + Seek> Writer<W> {
    /// Creates a writer, serializing the header to the stream.
    ///
    /// If the header declares inline waveform data and an expected point
    /// count, the stream is pre-extended to the end of the record region so
    /// that waveform payloads written alongside record `n` can never
    /// collide with records after `n`.
    pub fn new(mut write: W, mut header: Header) -> Result<Writer<W>> {
        let start = write.stream_position()?;
        header.update_header();
        header.write_to(&mut write)?;
        let expected_point_count = header.number_of_point_records();
        let data_end = start
            + header.point_data_offset()
            + expected_point_count * header.data_record_length() as u64;
        if header.has_waveform_data()
            && header.is_internal_waveform_data()
            && expected_point_count > 0
        {
            let position = write.stream_position()?;
            let _ = write.seek(SeekFrom::Start(data_end - 1))?;
            write.write_all(&[0])?;
            let _ = write.seek(SeekFrom::Start(position))?;
        }
        Ok(Writer {
            write: Some(write),
            start,
            header,
            srs: SpatialReference::default(),
            prj_path: None,
            point_count: 0,
            expected_point_count,
            waveform_tail: 0,
            closed: false,
        })
    }

    /// Returns this writer's header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the georeference.
    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    /// Sets the georeference, written to the `.prj` companion on close for
    /// path-based writers.
    pub fn set_srs(&mut self, srs: SpatialReference) {
        self.srs = srs;
    }

    /// Writes one point record.
    ///
    /// The point's record length must match this writer's header. If the
    /// header carries waveform descriptors and the point has a payload, the
    /// payload's file address is stamped into the point before the record
    /// is serialized and the payload bytes are written past the record
    /// region.
    pub fn write_point(&mut self, point: &mut Point) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedWriter);
        }
        if point.data().len() != self.header.data_record_length() {
            return Err(Error::InvalidPointData(format!(
                "point record is {} bytes but the writer's schema needs {}",
                point.data().len(),
                self.header.data_record_length()
            )));
        }
        let mut waveform_offset = 0;
        let write_waveform = self.header.has_waveform_data() && point.has_waveform_data();
        if write_waveform {
            if !self.header.is_internal_waveform_data() {
                return Err(Error::NotYetImplemented("external waveform data files"));
            }
            waveform_offset = self.header.point_data_offset()
                + self.expected_point_count * self.header.data_record_length() as u64
                + self.waveform_tail;
            point.set_waveform_data_address(waveform_offset, point.waveform_data().len() as u32)?;
        }
        let start = self.start;
        let stream = self.write.as_mut().expect("stream present until into_inner");
        stream.write_all(point.data())?;
        if write_waveform {
            let previous = stream.stream_position()?;
            let _ = stream.seek(SeekFrom::Start(start + waveform_offset))?;
            stream.write_all(point.waveform_data())?;
            let _ = stream.seek(SeekFrom::Start(previous))?;
            self.waveform_tail += point.waveform_data().len() as u64;
        }
        self.header.grow_bounds(point.x(), point.y(), point.z());
        self.point_count += 1;
        Ok(())
    }

    /// Rewrites the header in place with a compatible replacement.
    pub fn update_header(&mut self, header: &Header) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedWriter);
        }
        if !self.header.is_compatible(header) {
            return Err(Error::InvalidPointData(
                "replacement header is not compatible".to_string(),
            ));
        }
        self.header = header.clone();
        self.header.update_header();
        let start = self.start;
        let header = self.header.clone();
        let stream = self.write.as_mut().expect("stream present until into_inner");
        let previous = stream.stream_position()?;
        let _ = stream.seek(SeekFrom::Start(start))?;
        header.write_to(&mut *stream)?;
        let _ = stream.seek(SeekFrom::Start(previous))?;
        Ok(())
    }

    /// Closes this writer, rewriting the point count into the header.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::Writer;
    /// use std::io::Cursor;
    ///
    /// let mut writer = Writer::new(Cursor::new(Vec::new()), Default::default()).unwrap();
    /// writer.close().unwrap();
    /// assert!(writer.close().is_err());
    /// ```
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedWriter);
        }
        self.header.set_number_of_point_records(self.point_count);
        let start = self.start;
        let header = self.header.clone();
        let stream = self.write.as_mut().expect("stream present until into_inner");
        let _ = stream.seek(SeekFrom::Start(start))?;
        header.write_to(&mut *stream)?;
        stream.flush()?;
        if let (Some(path), false) = (self.prj_path.as_ref(), self.srs.is_empty()) {
            self.srs.write_companion(path)?;
        }
        self.closed = true;
        Ok(())
    }

    /// Closes this writer and returns its stream, seeked back to the start
    /// of the HSPCD data.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Reader, Writer};
    /// use std::io::Cursor;
    ///
    /// let writer = Writer::new(Cursor::new(Vec::new()), Default::default()).unwrap();
    /// let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    /// ```
    pub fn into_inner(mut self) -> Result<W> {
        if !self.closed {
            self.close()?;
        }
        let mut write = self.write.take().expect("stream taken only here");
        let _ = write.seek(SeekFrom::Start(self.start))?;
        Ok(write)
    }

    /// Rewrites only the point-count slot of the header.
    ///
    /// `close` does this as part of the full header rewrite; this is the
    /// narrow variant for callers that keep the writer open.
    pub fn update_point_count(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedWriter);
        }
        let count = self.point_count;
        self.header.set_number_of_point_records(count);
        let position = self.start + raw::POINT_COUNT_OFFSET;
        let stream = self.write.as_mut().expect("stream present until into_inner");
        let previous = stream.stream_position()?;
        let _ = stream.seek(SeekFrom::Start(position))?;
        stream.write_u64::<LittleEndian>(count)?;
        let _ = stream.seek(SeekFrom::Start(previous))?;
        Ok(())
    }
}

impl Writer<BufWriter<File>> {
    /// Creates a writer for a file path.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::Writer;
    /// let writer = Writer::from_path("/dev/null", Default::default());
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P, header: Header) -> Result<Writer<BufWriter<File>>> {
        let file = File::create(path.as_ref())?;
        let mut writer = Writer::new(BufWriter::new(file), header)?;
        writer.prj_path = Some(path.as_ref().to_path_buf());
        Ok(writer)
    }
}

impl<W: Write + Seek> Drop for Writer<W> {
    fn drop(&mut self) {
        if !self.closed && self.write.is_some() {
            if let Err(err) = self.close() {
                log::error!("error closing writer during drop: {err}");
            }
        }
    }
}

impl<W: Write + Seek> std::fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("point_count", &self.point_count)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::BandDesc,
        field::DataType,
        waveform::WaveformPacketDesc,
        PointFormat, Reader,
    };
    use std::io::Cursor;

    #[test]
    fn count_is_rewritten_on_close() {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
        for _ in 0..3 {
            writer.write_point(&mut Point::default()).unwrap();
        }
        let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
        assert_eq!(3, reader.header().number_of_point_records());
    }

    #[test]
    fn bounds_grow_with_points() {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
        let mut point = Point::default();
        point.set_coordinates(1., 2., 3.).unwrap();
        writer.write_point(&mut point).unwrap();
        point.set_coordinates(-1., 0., 9.).unwrap();
        writer.write_point(&mut point).unwrap();
        let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
        let bounds = reader.header().bounds();
        assert_eq!(-1., bounds.min.x);
        assert_eq!(9., bounds.max.z);
    }

    #[test]
    fn record_length_must_match() {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
        let mut header = Header::new(PointFormat::new(1).unwrap());
        header
            .schema_mut()
            .add_band(DataType::Short, "Band Value", "")
            .unwrap();
        let mut point = Point::new(std::sync::Arc::new(header));
        assert!(writer.write_point(&mut point).is_err());
    }

    #[test]
    fn file_is_preextended_for_waveforms() {
        let mut header = Header::new(PointFormat::new(5).unwrap());
        header.add_waveform_packet_desc(WaveformPacketDesc::new(0, 8, 0, 128, 10, 1., 0.));
        header.set_number_of_point_records(2);
        header.update_header();
        let record_length = header.data_record_length() as u64;
        let data_offset = header.point_data_offset();

        let writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
        let cursor = writer.into_inner().unwrap();
        assert!(cursor.get_ref().len() as u64 >= data_offset + 2 * record_length);
    }

    #[test]
    fn incompatible_update_header() {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Header::default()).unwrap();
        let mut other = Header::default();
        other
            .schema_mut()
            .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 1)
            .unwrap();
        assert!(writer.update_header(&other).is_err());
    }
}
