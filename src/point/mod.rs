//! Point records.
//!
//! A [Point] is one fixed-size record plus an optional variable-length
//! waveform payload. Its layout is defined by the [Header](crate::Header)
//! it was created against, which every point shares by reference; points
//! constructed without an explicit header use the process-wide default.
//!
//! ```
//! use hspc::Point;
//!
//! let mut point = Point::default();
//! point.set_coordinates(1., 2., 3.).unwrap();
//! assert_eq!(1., point.x());
//! ```
//!
//! Fields beyond x, y and z are accessed generically through
//! [Variant](crate::Variant)s:
//!
//! ```
//! use hspc::{Header, Point, PointFormat, FieldId, Variant};
//! use std::sync::Arc;
//!
//! let header = Arc::new(Header::new(PointFormat::new(1).unwrap()));
//! let mut point = Point::new(header);
//! point.set_values_by_id(FieldId::Classification, &[Variant::from(2u8)]).unwrap();
//! let values = point.values_by_id(FieldId::Classification).unwrap();
//! assert_eq!(Some(2u8), values[0].get());
//! ```

mod bits;

pub(crate) use self::bits::{read_bitfield, write_bitfield};

use crate::{
    field::DataType,
    transform::sround,
    waveform::{
        WaveformPacketDataDefinition, WaveformPacketRecord, WAVEFORM_PACKET_DATA_DEFINITION_SIZE,
    },
    Bitset, Error, Field, FieldId, Header, Result, Transform, Variant,
};
use byteorder::{ByteOrder, LittleEndian};
use num_traits::{NumCast, ToPrimitive, Zero};
use std::sync::Arc;

/// Coordinates closer than this are considered equal.
const COORDINATE_EPSILON: f64 = 1e-5;

/// Which way a scale/offset conversion runs during a bulk copy.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ScaleDirection {
    /// Logical value to raw storage.
    In,
    /// Raw storage to logical value.
    Out,
}

/// One point record and its optional waveform payload.
#[derive(Clone, Debug)]
pub struct Point {
    data: Vec<u8>,
    waveform_data: Vec<u8>,
    header: Arc<Header>,
}

impl Point {
    /// Creates a zeroed point laid out by the given header.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Header, Point, PointFormat};
    /// use std::sync::Arc;
    ///
    /// let header = Arc::new(Header::new(PointFormat::new(1).unwrap()));
    /// let point = Point::new(header.clone());
    /// assert_eq!(header.data_record_length(), point.data().len());
    /// ```
    pub fn new(header: Arc<Header>) -> Point {
        Point {
            data: vec![0; header.data_record_length()],
            waveform_data: Vec::new(),
            header,
        }
    }

    /// Returns the header this point is laid out by.
    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    /// Rebinds this point to another header.
    ///
    /// If the new header changes the record length the buffer is rebuilt
    /// and the coordinates carried over; if it changes the coordinate scale
    /// or offset the raw storage is re-projected so the logical coordinates
    /// are preserved.
    pub fn set_header(&mut self, header: Arc<Header>) -> Result<()> {
        let wanted = header.data_record_length();
        if self.data.iter().all(|&byte| byte == 0) {
            self.data = vec![0; wanted];
            self.header = header;
            return Ok(());
        }
        let rescale =
            self.header.scale() != header.scale() || self.header.offset() != header.offset();
        if wanted != self.data.len() {
            let (x, y, z) = (self.x(), self.y(), self.z());
            self.data = vec![0; wanted];
            self.header = header;
            self.set_coordinates(x, y, z)?;
        } else if rescale {
            let (x, y, z) = (self.x(), self.y(), self.z());
            self.header = header;
            self.set_coordinates(x, y, z)?;
        } else {
            self.header = header;
        }
        Ok(())
    }

    /// Returns the record bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the record bytes mutably.
    pub(crate) fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Returns the scaled x coordinate.
    pub fn x(&self) -> f64 {
        self.coordinate_transform(0).direct(self.raw_x())
    }

    /// Returns the scaled y coordinate.
    pub fn y(&self) -> f64 {
        self.coordinate_transform(1).direct(self.raw_y())
    }

    /// Returns the scaled z coordinate.
    pub fn z(&self) -> f64 {
        self.coordinate_transform(2).direct(self.raw_z())
    }

    /// Returns the stored integer x.
    pub fn raw_x(&self) -> i32 {
        LittleEndian::read_i32(&self.data[0..4])
    }

    /// Returns the stored integer y.
    pub fn raw_y(&self) -> i32 {
        LittleEndian::read_i32(&self.data[4..8])
    }

    /// Returns the stored integer z.
    pub fn raw_z(&self) -> i32 {
        LittleEndian::read_i32(&self.data[8..12])
    }

    /// Sets the x coordinate, descaling into raw storage.
    pub fn set_x(&mut self, x: f64) -> Result<()> {
        let raw = self.coordinate_transform(0).inverse(x)?;
        self.set_raw_x(raw);
        Ok(())
    }

    /// Sets the y coordinate, descaling into raw storage.
    pub fn set_y(&mut self, y: f64) -> Result<()> {
        let raw = self.coordinate_transform(1).inverse(y)?;
        self.set_raw_y(raw);
        Ok(())
    }

    /// Sets the z coordinate, descaling into raw storage.
    pub fn set_z(&mut self, z: f64) -> Result<()> {
        let raw = self.coordinate_transform(2).inverse(z)?;
        self.set_raw_z(raw);
        Ok(())
    }

    /// Sets all three coordinates.
    pub fn set_coordinates(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.set_x(x)?;
        self.set_y(y)?;
        self.set_z(z)
    }

    /// Sets the stored integer x.
    pub fn set_raw_x(&mut self, raw: i32) {
        LittleEndian::write_i32(&mut self.data[0..4], raw);
    }

    /// Sets the stored integer y.
    pub fn set_raw_y(&mut self, raw: i32) {
        LittleEndian::write_i32(&mut self.data[4..8], raw);
    }

    /// Sets the stored integer z.
    pub fn set_raw_z(&mut self, raw: i32) {
        LittleEndian::write_i32(&mut self.data[8..12], raw);
    }

    /// Returns every value of the fields with this id, in sequence order.
    ///
    /// Scaled fields extract as `raw * scale + offset` doubles; unscaled
    /// fields extract in their native type.
    pub fn values_by_id(&self, id: FieldId) -> Result<Vec<Variant>> {
        let fields = self.header.schema().fields_by_id(id);
        if fields.is_empty() {
            return Err(Error::MissingField(id));
        }
        fields
            .into_iter()
            .map(|field| {
                let raw = self.raw_value_from_field(field)?;
                Ok(apply_scale_out(field, raw))
            })
            .collect()
    }

    /// Writes every field with this id, in sequence order.
    ///
    /// The number of values must match the number of fields. Values for
    /// scaled fields are inverse-transformed into the raw type with
    /// round-half-away-from-zero.
    pub fn set_values_by_id(&mut self, id: FieldId, values: &[Variant]) -> Result<()> {
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
            self.set_raw_value_to_field(field, &raw)?;
        }
        Ok(())
    }

    /// Returns the value of the field at a sequence index.
    pub fn value(&self, index: usize) -> Result<Variant> {
        let field = self
            .header
            .schema()
            .field(index)
            .ok_or(Error::MissingFieldIndex(index))?;
        let raw = self.raw_value_from_field(field)?;
        Ok(apply_scale_out(field, raw))
    }

    /// Writes the value of the field at a sequence index.
    pub fn set_value(&mut self, index: usize, value: &Variant) -> Result<()> {
        let header = self.header.clone();
        let field = header
            .schema()
            .field(index)
            .ok_or(Error::MissingFieldIndex(index))?;
        let raw = raw_variant_for(field, value)?;
        self.set_raw_value_to_field(field, &raw)
    }

    /// Bulk-copies a contiguous range of band values out of the record.
    ///
    /// The output is packed in each band's native type, in band order, and
    /// must be sized to hold the range. Each value is scale/offset
    /// transformed if its field requires it.
    pub fn band_values(&self, start_band: usize, band_count: usize, out: &mut [u8]) -> Result<()> {
        let (start, stop) = self.band_range(start_band, band_count)?;
        self.data_range(start, stop, out)
    }

    /// Bulk-copies values into a contiguous range of band fields.
    pub fn set_band_values(
        &mut self,
        start_band: usize,
        band_count: usize,
        values: &[u8],
    ) -> Result<()> {
        let (start, stop) = self.band_range(start_band, band_count)?;
        self.set_data_range(start, stop, values)
    }

    /// Bulk-copies a range of fields, by sequence index, out of the record.
    pub fn data_range(&self, start_index: usize, stop_index: usize, out: &mut [u8]) -> Result<()> {
        let (start, stop) = order(start_index, stop_index);
        let schema = self.header.schema();
        if stop >= schema.field_count() {
            return Err(Error::MissingFieldIndex(stop));
        }
        let mut out_pos = 0;
        for index in start..=stop {
            let field = schema.field(index).expect("checked above");
            let byte = out_pos / 8;
            if byte + field.byte_size() > out.len() {
                return Err(Error::InvalidPointData(format!(
                    "output buffer of {} bytes is too small for the field range",
                    out.len()
                )));
            }
            copy_field(
                field,
                &self.data[field.byte_offset..],
                &mut out[byte..],
                ScaleDirection::Out,
            )?;
            out_pos += field.bit_size;
        }
        Ok(())
    }

    /// Bulk-copies values into a range of fields by sequence index.
    pub fn set_data_range(
        &mut self,
        start_index: usize,
        stop_index: usize,
        values: &[u8],
    ) -> Result<()> {
        let (start, stop) = order(start_index, stop_index);
        let header = self.header.clone();
        let schema = header.schema();
        if stop >= schema.field_count() {
            return Err(Error::MissingFieldIndex(stop));
        }
        let mut in_pos = 0;
        for index in start..=stop {
            let field = schema.field(index).expect("checked above");
            let byte = in_pos / 8;
            if byte + field.byte_size() > values.len() {
                return Err(Error::InvalidPointData(format!(
                    "input buffer of {} bytes is too small for the field range",
                    values.len()
                )));
            }
            copy_field(
                field,
                &values[byte..],
                &mut self.data[field.byte_offset..],
                ScaleDirection::In,
            )?;
            in_pos += field.bit_size;
        }
        Ok(())
    }

    /// Does this point carry a waveform payload?
    pub fn has_waveform_data(&self) -> bool {
        !self.waveform_data.is_empty()
    }

    /// Returns the waveform payload bytes.
    pub fn waveform_data(&self) -> &[u8] {
        &self.waveform_data
    }

    /// Returns the waveform payload bytes mutably.
    pub(crate) fn waveform_data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.waveform_data
    }

    /// Replaces the waveform payload with an assembled record.
    pub fn set_waveform_data(&mut self, record: &WaveformPacketRecord) {
        self.waveform_data = record.to_waveform_data();
    }

    /// Replaces the waveform payload bytes.
    pub fn set_waveform_data_bytes(&mut self, data: Vec<u8>) {
        self.waveform_data = data;
    }

    /// Returns the file byte offset of this point's waveform payload.
    pub fn waveform_data_byte_offset(&self) -> Result<u64> {
        let values = self.values_by_id(FieldId::ByteOffsetToWaveformData)?;
        values[0].get::<u64>().ok_or_else(|| {
            Error::InvalidPointData("waveform byte offset is not numeric".to_string())
        })
    }

    /// Returns the byte size of this point's waveform payload.
    pub fn waveform_data_size(&self) -> Result<u32> {
        let values = self.values_by_id(FieldId::WaveformDataSize)?;
        values[0]
            .get::<u32>()
            .ok_or_else(|| Error::InvalidPointData("waveform size is not numeric".to_string()))
    }

    /// Records where this point's waveform payload lives in the file.
    pub fn set_waveform_data_address(&mut self, offset: u64, size: u32) -> Result<()> {
        let header = self.header.clone();
        let schema = header.schema();
        let offset_field = schema
            .fields_by_id(FieldId::ByteOffsetToWaveformData)
            .first()
            .copied()
            .ok_or(Error::MissingField(FieldId::ByteOffsetToWaveformData))?
            .byte_offset;
        let size_field = schema
            .fields_by_id(FieldId::WaveformDataSize)
            .first()
            .copied()
            .ok_or(Error::MissingField(FieldId::WaveformDataSize))?
            .byte_offset;
        LittleEndian::write_u64(&mut self.data[offset_field..offset_field + 8], offset);
        LittleEndian::write_u32(&mut self.data[size_field..size_field + 4], size);
        Ok(())
    }

    /// Returns the number of per-band waveform packets in the payload.
    pub fn waveform_band_count(&self) -> u16 {
        if self.waveform_data.len() < 2 {
            0
        } else {
            LittleEndian::read_u16(&self.waveform_data[0..2])
        }
    }

    /// Returns the packet definition for one band, if present.
    pub fn waveform_packet_definition(&self, band: u16) -> Option<WaveformPacketDataDefinition> {
        self.waveform_packet_definitions()
            .into_iter()
            .find(|definition| definition.band_index == band)
    }

    /// Returns the descriptor index recorded for one band, if present.
    pub fn waveform_descriptor_index(&self, band: u16) -> Option<u16> {
        self.waveform_packet_definition(band)
            .map(|definition| definition.descriptor_index)
    }

    /// Returns every packet definition in the payload.
    pub fn waveform_packet_definitions(&self) -> Vec<WaveformPacketDataDefinition> {
        let count = self.waveform_band_count() as usize;
        let mut definitions = Vec::with_capacity(count);
        let mut position = 2;
        for _ in 0..count {
            if position + WAVEFORM_PACKET_DATA_DEFINITION_SIZE > self.waveform_data.len() {
                break;
            }
            if let Ok(definition) =
                WaveformPacketDataDefinition::read_from(&self.waveform_data[position..])
            {
                definitions.push(definition);
            }
            position += WAVEFORM_PACKET_DATA_DEFINITION_SIZE;
        }
        definitions
    }

    /// Slices the raw packet bytes for one band out of the payload.
    pub fn raw_waveform_packet_data(&self, band: u16) -> Result<Vec<u8>> {
        let definition = self.waveform_packet_definition(band).ok_or_else(|| {
            Error::InvalidPointData(format!("no waveform packet for band {band}"))
        })?;
        let start = definition.byte_offset as usize;
        let end = start + definition.size as usize;
        if end > self.waveform_data.len() {
            return Err(Error::InvalidPointData(format!(
                "waveform packet for band {band} is out of bounds"
            )));
        }
        Ok(self.waveform_data[start..end].to_vec())
    }

    /// Reads one field's raw (unscaled) value.
    pub(crate) fn raw_value_from_field(&self, field: &Field) -> Result<Variant> {
        let offset = field.byte_offset;
        let data = &self.data[offset..];
        let variant = match field.data_type {
            DataType::Bit => Variant::Bitset(read_bitfield(
                &self.data,
                offset,
                field.bit_offset,
                field.bit_size,
            )),
            DataType::Char => {
                let bytes = &data[..field.byte_size()];
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Variant::String(std::str::from_utf8(&bytes[..end])?.to_string())
            }
            DataType::UnsignedChar => Variant::U8(data[0]),
            DataType::Short => Variant::I16(LittleEndian::read_i16(data)),
            DataType::UnsignedShort => Variant::U16(LittleEndian::read_u16(data)),
            DataType::Long => Variant::I32(LittleEndian::read_i32(data)),
            DataType::UnsignedLong => Variant::U32(LittleEndian::read_u32(data)),
            DataType::LongLong => Variant::I64(LittleEndian::read_i64(data)),
            DataType::UnsignedLongLong => Variant::U64(LittleEndian::read_u64(data)),
            DataType::Float => Variant::F32(LittleEndian::read_f32(data)),
            DataType::Double => Variant::F64(LittleEndian::read_f64(data)),
            DataType::Reserved | DataType::Unknown => {
                return Err(Error::InvalidPointData(format!(
                    "field {} has unusable data type",
                    field.name
                )))
            }
        };
        Ok(variant)
    }

    /// Writes one field's raw (unscaled) value.
    pub(crate) fn set_raw_value_to_field(&mut self, field: &Field, value: &Variant) -> Result<()> {
        let offset = field.byte_offset;
        let not_convertible = || {
            Error::InvalidPointData(format!(
                "value {value:?} is not convertible to field {}",
                field.name
            ))
        };
        match field.data_type {
            DataType::Bit => {
                let bitset = value.get::<Bitset>().ok_or_else(not_convertible)?;
                write_bitfield(
                    &mut self.data,
                    offset,
                    field.bit_offset,
                    field.bit_size,
                    &bitset,
                );
            }
            DataType::Char => {
                let string = value.get::<String>().ok_or_else(not_convertible)?;
                let size = field.byte_size();
                if string.len() > size {
                    return Err(Error::StringTooLong {
                        string,
                        len: size,
                    });
                }
                let slot = &mut self.data[offset..offset + size];
                slot.fill(0);
                slot[..string.len()].copy_from_slice(string.as_bytes());
            }
            DataType::UnsignedChar => {
                self.data[offset] = value.get::<u8>().ok_or_else(not_convertible)?;
            }
            DataType::Short => LittleEndian::write_i16(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::UnsignedShort => LittleEndian::write_u16(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::Long => LittleEndian::write_i32(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::UnsignedLong => LittleEndian::write_u32(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::LongLong => LittleEndian::write_i64(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::UnsignedLongLong => LittleEndian::write_u64(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::Float => LittleEndian::write_f32(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::Double => LittleEndian::write_f64(
                &mut self.data[offset..],
                value.get().ok_or_else(not_convertible)?,
            ),
            DataType::Reserved | DataType::Unknown => {
                return Err(Error::InvalidPointData(format!(
                    "field {} has unusable data type",
                    field.name
                )))
            }
        }
        Ok(())
    }

    fn band_range(&self, start_band: usize, band_count: usize) -> Result<(usize, usize)> {
        if band_count == 0 {
            return Err(Error::InvalidPointData("empty band range".to_string()));
        }
        let schema = self.header.schema();
        let start = schema
            .nth_index(FieldId::BandValue, start_band)
            .ok_or(Error::MissingField(FieldId::BandValue))?;
        let stop = schema
            .nth_index(FieldId::BandValue, start_band + band_count - 1)
            .ok_or(Error::MissingField(FieldId::BandValue))?;
        Ok((start, stop))
    }

    fn coordinate_transform(&self, axis: usize) -> Transform {
        let scale = self.header.scale();
        let offset = self.header.offset();
        match axis {
            0 => Transform {
                scale: scale.x,
                offset: offset.x,
            },
            1 => Transform {
                scale: scale.y,
                offset: offset.y,
            },
            _ => Transform {
                scale: scale.z,
                offset: offset.z,
            },
        }
    }
}

impl Default for Point {
    fn default() -> Point {
        Point::new(crate::default_header())
    }
}

impl PartialEq for Point {
    /// Coordinate-only equality with a 1e-5 epsilon.
    fn eq(&self, other: &Point) -> bool {
        (self.x() - other.x()).abs() <= COORDINATE_EPSILON
            && (self.y() - other.y()).abs() <= COORDINATE_EPSILON
            && (self.z() - other.z()).abs() <= COORDINATE_EPSILON
    }
}

fn order(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Converts a raw field value into the value callers see.
fn apply_scale_out(field: &Field, raw: Variant) -> Variant {
    if field.is_scaled() || field.is_offset() {
        match raw.get::<f64>() {
            Some(value) => Variant::F64(value * field.scale() + field.offset()),
            None => raw,
        }
    } else {
        raw
    }
}

/// Converts a caller's value into the raw variant stored in the record.
pub(crate) fn raw_variant_for(field: &Field, value: &Variant) -> Result<Variant> {
    if !(field.is_scaled() || field.is_offset()) {
        return Ok(value.clone());
    }
    let logical = value.get::<f64>().ok_or_else(|| {
        Error::InvalidPointData(format!(
            "value {value:?} is not numeric and field {} is scaled",
            field.name
        ))
    })?;
    let descaled = (logical - field.offset()) / field.scale();
    let raw = match field.data_type {
        DataType::Short => Variant::I16(sround(descaled) as i16),
        DataType::UnsignedShort => Variant::U16(sround(descaled) as u16),
        DataType::Long => Variant::I32(sround(descaled) as i32),
        DataType::UnsignedLong => Variant::U32(sround(descaled) as u32),
        DataType::LongLong => Variant::I64(sround(descaled) as i64),
        DataType::UnsignedLongLong => Variant::U64(sround(descaled) as u64),
        DataType::Float => Variant::F32(descaled as f32),
        DataType::Double => Variant::F64(descaled),
        // scale and offset never apply to these
        DataType::UnsignedChar => Variant::U8(sround(descaled) as u8),
        _ => value.clone(),
    };
    Ok(raw)
}

/// Applies a scale/offset conversion in the field's native type.
fn convert_scaled<T: NumCast + ToPrimitive + Zero + Copy>(
    value: T,
    scale: f64,
    offset: f64,
    direction: ScaleDirection,
) -> T {
    let value = value.to_f64().unwrap_or(0.);
    let converted = match direction {
        ScaleDirection::Out => sround(scale * value + offset),
        ScaleDirection::In => sround((value - offset) / scale),
    };
    num_traits::cast(converted).unwrap_or_else(T::zero)
}

fn copy_numeric<T>(field: &Field, input: T, direction: ScaleDirection) -> T
where
    T: NumCast + ToPrimitive + Zero + Copy,
{
    if field.is_scaled() || field.is_offset() {
        convert_scaled(input, field.scale(), field.offset(), direction)
    } else {
        input
    }
}

/// Copies one field value between a record buffer and a naturally-aligned
/// external buffer, applying scale/offset per the field.
fn copy_field(
    field: &Field,
    input: &[u8],
    output: &mut [u8],
    direction: ScaleDirection,
) -> Result<()> {
    match field.data_type {
        DataType::Bit => {
            // raw masked copy at the field's bit positions
            let byte_size = field.byte_size();
            for i in 0..byte_size {
                let (start, stop) = bits::bit_window(i, byte_size, field.bit_offset, field.bit_size);
                let mut mask = 0u8;
                for j in start..=stop {
                    mask |= 1 << j;
                }
                output[i] = (output[i] & !mask) | (input[i] & mask);
            }
        }
        DataType::UnsignedChar => {
            output[0] = copy_numeric(field, input[0], direction);
        }
        DataType::Short => {
            let value = copy_numeric(field, LittleEndian::read_i16(input), direction);
            LittleEndian::write_i16(output, value);
        }
        DataType::UnsignedShort => {
            let value = copy_numeric(field, LittleEndian::read_u16(input), direction);
            LittleEndian::write_u16(output, value);
        }
        DataType::Long => {
            let value = copy_numeric(field, LittleEndian::read_i32(input), direction);
            LittleEndian::write_i32(output, value);
        }
        DataType::UnsignedLong => {
            let value = copy_numeric(field, LittleEndian::read_u32(input), direction);
            LittleEndian::write_u32(output, value);
        }
        DataType::LongLong => {
            let value = copy_numeric(field, LittleEndian::read_i64(input), direction);
            LittleEndian::write_i64(output, value);
        }
        DataType::UnsignedLongLong => {
            let value = copy_numeric(field, LittleEndian::read_u64(input), direction);
            LittleEndian::write_u64(output, value);
        }
        DataType::Float => {
            let value = copy_numeric(field, LittleEndian::read_f32(input), direction);
            LittleEndian::write_f32(output, value);
        }
        DataType::Double => {
            let value = copy_numeric(field, LittleEndian::read_f64(input), direction);
            LittleEndian::write_f64(output, value);
        }
        DataType::Char | DataType::Reserved | DataType::Unknown => {
            return Err(Error::InvalidPointData(format!(
                "field {} cannot be bulk copied",
                field.name
            )))
        }
    }
    Ok(())
}
