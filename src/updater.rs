//! Update HSPCD points in place.
//!
//! An [Updater] opens a file read-write and rewrites individual field
//! values, or whole records, without touching its neighbours:
//!
//! ```no_run
//! use hspc::{FieldId, Updater, Variant};
//!
//! let mut updater = Updater::from_path("cloud.hsp").unwrap();
//! updater.seek(0).unwrap();
//! updater
//!     .write_field_values_by_id(FieldId::Classification, &[Variant::from(2u8)])
//!     .unwrap();
//! ```
//!
//! Field writes target the record at the cursor index: position with
//! [seek](Updater::seek), not by reading past the record.

use crate::{
    field::DataType,
    filter::{PointFilter, PointTransform},
    point::{raw_variant_for, write_bitfield},
    srs::SpatialReference,
    Bitset, Error, Field, FieldId, Header, Point, Result, Variant,
};
use byteorder::{ByteOrder, LittleEndian};
use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Arc,
};

/// Reads and rewrites points through one read-write handle.
pub struct Updater<F> {
    file: F,
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

impl<F: Read + Write + Seek> Updater<F> {
    /// Creates an updater, deserializing the header from the stream.
    pub fn new(mut file: F) -> Result<Updater<F>> {
        let start = file.stream_position()?;
        let header = Arc::new(Header::read_from(&mut file)?);
        let point = Point::new(header.clone());
        let size = header.number_of_point_records();
        let record_size = header.data_record_length();
        Ok(Updater {
            file,
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

    /// Returns this updater's header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the georeference.
    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    /// Returns the last point read.
    pub fn point(&self) -> &Point {
        &self.point
    }

    /// Returns the cursor index: the record the next field write targets.
    pub fn current_index(&self) -> u64 {
        self.current
    }

    /// Installs the filter chain.
    pub fn set_filters(&mut self, filters: Vec<Box<dyn PointFilter>>) {
        self.filters = filters;
    }

    /// Installs the transform chain.
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
    pub fn read_next_point(&mut self, with_waveform: bool) -> Result<bool> {
        if self.current == 0 {
            let _ = self
                .file
                .seek(SeekFrom::Start(self.start + self.header.point_data_offset()))?;
        }
        loop {
            if self.current >= self.size {
                return Ok(false);
            }
            if self.need_header_check && !Arc::ptr_eq(self.point.header(), &self.header) {
                self.point.set_header(self.header.clone())?;
            }
            match self.file.read_exact(self.point.data_mut()) {
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

    /// Positions the cursor so field writes target record `n`.
    pub fn seek(&mut self, n: u64) -> Result<()> {
        if n >= self.size {
            return Err(Error::PointOutOfRange {
                index: n,
                count: self.size,
            });
        }
        let position = self.record_position(n);
        let _ = self.file.seek(SeekFrom::Start(position))?;
        self.current = n;
        Ok(())
    }

    /// Reads the point at index `n`.
    pub fn read_point_at(&mut self, n: u64, with_waveform: bool) -> Result<&Point> {
        if n >= self.size {
            return Err(Error::PointOutOfRange {
                index: n,
                count: self.size,
            });
        }
        let position = self.record_position(n);
        let _ = self.file.seek(SeekFrom::Start(position))?;
        self.file.read_exact(self.point.data_mut())?;
        self.current = n + 1;
        for transform in &self.transforms {
            transform.transform(&mut self.point);
        }
        if with_waveform {
            self.read_waveform_data()?;
        }
        Ok(&self.point)
    }

    /// Rewrites the whole record at the current cursor index.
    ///
    /// The point's stored waveform address is honored, never recomputed, so
    /// an in-place rewrite cannot corrupt the waveform region.
    pub fn write_point(&mut self, point: &Point, update_waveform: bool) -> Result<()> {
        if point.data().len() != self.record_size {
            return Err(Error::InvalidPointData(format!(
                "point record is {} bytes but the file's schema needs {}",
                point.data().len(),
                self.record_size
            )));
        }
        if self.current >= self.size {
            return Err(Error::PointOutOfRange {
                index: self.current,
                count: self.size,
            });
        }
        let position = self.record_position(self.current);
        let _ = self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(point.data())?;
        if update_waveform
            && self.header.has_waveform_data()
            && self.header.is_internal_waveform_data()
            && point.has_waveform_data()
        {
            let offset = point.waveform_data_byte_offset()?;
            let previous = self.file.stream_position()?;
            let _ = self.file.seek(SeekFrom::Start(self.start + offset))?;
            self.file.write_all(point.waveform_data())?;
            let _ = self.file.seek(SeekFrom::Start(previous))?;
        }
        self.current += 1;
        Ok(())
    }

    /// Rewrites one field of the record at the current cursor index.
    ///
    /// The value is inverse scale/offset transformed into the field's raw
    /// type, exactly the field's bytes are rewritten (bit granularity for
    /// bit fields), and the cursor is restored to the record start.
    pub fn write_field_value(&mut self, index: usize, value: &Variant) -> Result<()> {
        let header = self.header.clone();
        let field = header
            .schema()
            .field(index)
            .ok_or(Error::MissingFieldIndex(index))?;
        let raw = raw_variant_for(field, value)?;
        self.write_raw_value_to_field(field, &raw)
    }

    /// Rewrites every field with this id on the record at the current
    /// cursor index.
    pub fn write_field_values_by_id(&mut self, id: FieldId, values: &[Variant]) -> Result<()> {
        let header = self.header.clone();
        let fields = header.schema().fields_by_id(id);
        if fields.is_empty() {
            return Err(Error::MissingField(id));
        }
        if fields.len() != values.len() {
            return Err(Error::InvalidPointData(format!(
                "{} values for {} fields with id {id:?}",
                values.len(),
                fields.len()
            )));
        }
        for (field, value) in fields.into_iter().zip(values) {
            let raw = raw_variant_for(field, value)?;
            self.write_raw_value_to_field(field, &raw)?;
        }
        Ok(())
    }

    fn write_raw_value_to_field(&mut self, field: &Field, value: &Variant) -> Result<()> {
        if self.current >= self.size {
            return Err(Error::PointOutOfRange {
                index: self.current,
                count: self.size,
            });
        }
        let record = self.record_position(self.current);
        let position = record + field.byte_offset as u64;
        let not_convertible = || {
            Error::InvalidPointData(format!(
                "value {value:?} is not convertible to field {}",
                field.name
            ))
        };
        match field.data_type {
            DataType::Bit => {
                // read-modify-write the field's bytes at bit granularity
                let byte_size = field.byte_size();
                let mut bytes = vec![0; byte_size];
                let _ = self.file.seek(SeekFrom::Start(position))?;
                self.file.read_exact(&mut bytes)?;
                let bitset = value.get::<Bitset>().ok_or_else(not_convertible)?;
                write_bitfield(&mut bytes, 0, field.bit_offset, field.bit_size, &bitset);
                let _ = self.file.seek(SeekFrom::Start(position))?;
                self.file.write_all(&bytes)?;
            }
            DataType::Char => {
                let string = value.get::<String>().ok_or_else(not_convertible)?;
                let size = field.byte_size();
                if string.len() > size {
                    return Err(Error::StringTooLong { string, len: size });
                }
                let mut bytes = vec![0; size];
                bytes[..string.len()].copy_from_slice(string.as_bytes());
                let _ = self.file.seek(SeekFrom::Start(position))?;
                self.file.write_all(&bytes)?;
            }
            _ => {
                let mut bytes = vec![0; field.byte_size()];
                match field.data_type {
                    DataType::UnsignedChar => {
                        bytes[0] = value.get().ok_or_else(not_convertible)?
                    }
                    DataType::Short => LittleEndian::write_i16(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::UnsignedShort => LittleEndian::write_u16(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::Long => LittleEndian::write_i32(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::UnsignedLong => LittleEndian::write_u32(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::LongLong => LittleEndian::write_i64(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::UnsignedLongLong => LittleEndian::write_u64(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::Float => LittleEndian::write_f32(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    DataType::Double => LittleEndian::write_f64(
                        &mut bytes,
                        value.get().ok_or_else(not_convertible)?,
                    ),
                    _ => {
                        return Err(Error::InvalidPointData(format!(
                            "field {} has unusable data type",
                            field.name
                        )))
                    }
                }
                let _ = self.file.seek(SeekFrom::Start(position))?;
                self.file.write_all(&bytes)?;
            }
        }
        let _ = self.file.seek(SeekFrom::Start(record))?;
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
        let previous = self.file.stream_position()?;
        let _ = self.file.seek(SeekFrom::Start(self.start + offset))?;
        self.point.waveform_data_mut().resize(size as usize, 0);
        self.file.read_exact(self.point.waveform_data_mut())?;
        let _ = self.file.seek(SeekFrom::Start(previous))?;
        Ok(())
    }

    fn record_position(&self, n: u64) -> u64 {
        self.start + self.header.point_data_offset() + n * self.record_size as u64
    }
}

impl Updater<File> {
    /// Creates an updater for a file path, loading any `.prj` companion.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hspc::Updater;
    /// let updater = Updater::from_path("cloud.hsp").unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Updater<File>> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let mut updater = Updater::new(file)?;
        if let Some(srs) = SpatialReference::from_companion(path.as_ref())? {
            updater.srs = srs;
        }
        Ok(updater)
    }
}

impl<F> std::fmt::Debug for Updater<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("current", &self.current)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reader, Writer};
    use std::io::Cursor;

    fn file_with_points(count: usize) -> Cursor<Vec<u8>> {
        let header = Header::new(crate::PointFormat::new(1).unwrap());
        let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
        for i in 0..count {
            let mut point = Point::new(writer.header().clone().into());
            point
                .set_coordinates(i as f64, i as f64, i as f64)
                .unwrap();
            writer.write_point(&mut point).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn update_classification_in_place() {
        let mut updater = Updater::new(file_with_points(3)).unwrap();
        updater.seek(1).unwrap();
        updater
            .write_field_values_by_id(FieldId::Classification, &[Variant::from(2u8)])
            .unwrap();
        let mut cursor = updater.file;
        cursor.set_position(0);

        let mut reader = Reader::new(cursor).unwrap();
        assert!(reader.read_next_point(false).unwrap());
        let values = reader
            .point()
            .values_by_id(FieldId::Classification)
            .unwrap();
        assert_eq!(Some(0u8), values[0].get());
        assert!(reader.read_next_point(false).unwrap());
        let values = reader
            .point()
            .values_by_id(FieldId::Classification)
            .unwrap();
        assert_eq!(Some(2u8), values[0].get());
    }

    #[test]
    fn bit_field_update_preserves_neighbours() {
        let mut updater = Updater::new(file_with_points(1)).unwrap();
        updater.seek(0).unwrap();
        updater
            .write_field_values_by_id(
                FieldId::ReturnNumber,
                &[Variant::Bitset(Bitset::from_value(4, 3))],
            )
            .unwrap();
        updater
            .write_field_values_by_id(
                FieldId::NumberOfReturns,
                &[Variant::Bitset(Bitset::from_value(4, 5))],
            )
            .unwrap();
        let mut cursor = updater.file;
        cursor.set_position(0);
        let mut reader = Reader::new(cursor).unwrap();
        assert!(reader.read_next_point(false).unwrap());
        let point = reader.point();
        assert_eq!(
            Some(3u64),
            point.values_by_id(FieldId::ReturnNumber).unwrap()[0].get()
        );
        assert_eq!(
            Some(5u64),
            point.values_by_id(FieldId::NumberOfReturns).unwrap()[0].get()
        );
    }

    #[test]
    fn whole_record_rewrite() {
        let mut updater = Updater::new(file_with_points(2)).unwrap();
        let mut point = Point::new(updater.header.clone());
        point.set_coordinates(42., 43., 44.).unwrap();
        updater.seek(1).unwrap();
        updater.write_point(&point, false).unwrap();
        let point = updater.read_point_at(1, false).unwrap();
        assert_eq!(42., point.x());
    }

    #[test]
    fn seek_out_of_range() {
        let mut updater = Updater::new(file_with_points(2)).unwrap();
        assert!(updater.seek(2).is_err());
    }
}
