//! File-level metadata.
//!
//! A [Header] is a higher-level representation of everything that precedes
//! the point records in an HSPCD file: the fixed file header, the per-return
//! counts, the block descriptor, the field definitions (as an embedded
//! [Schema]), and the waveform packet descriptors.
//!
//! ```
//! use hspc::{Header, PointFormat};
//!
//! let mut header = Header::new(PointFormat::new(5).unwrap());
//! header.set_scale(0.01, 0.01, 0.01);
//! assert_eq!(0.01, header.scale().x);
//! ```

use crate::{
    raw::{self, FieldDefinition, BLOCK_DESC_SIZE, FILE_HEADER_SIZE, RESERVED_BYTES_AFTER_FIELDS},
    waveform::{WaveformPacketDesc, WAVEFORM_PACKET_DESC_SIZE},
    Bounds, Error, Field, FieldId, PointFormat, Result, Schema, Vector, Version,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    io::{Read, Write},
    sync::{Arc, OnceLock},
};

/// Metadata describing the layout, extents, and interpretation of the
/// points in one file.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    version: Version,
    byte_order: u8,
    number_of_point_records: u64,
    point_data_offset: u64,
    bounds: Bounds,
    points_by_return: Vec<u64>,
    field_def_encoding: u32,
    character_encoding: u16,
    band_data_internal: bool,
    waveform_data_internal: bool,
    waveform_descriptors: Vec<WaveformPacketDesc>,
    schema: Schema,
    is_compressed: bool,
}

impl Header {
    /// Creates a header for one of the point format presets.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Header, PointFormat};
    /// let header = Header::new(PointFormat::new(0).unwrap());
    /// assert_eq!(12, header.data_record_length());
    /// ```
    pub fn new(point_format: PointFormat) -> Header {
        let mut header = Header {
            version: Version::default(),
            byte_order: 0,
            number_of_point_records: 0,
            point_data_offset: 0,
            bounds: Bounds::default(),
            points_by_return: Vec::new(),
            field_def_encoding: 0,
            character_encoding: 0,
            band_data_internal: true,
            waveform_data_internal: true,
            waveform_descriptors: Vec::new(),
            schema: Schema::new(point_format),
            is_compressed: false,
        };
        header.set_scale(1., 1., 1.);
        header.point_data_offset = header.header_size() as u64;
        header
    }

    /// Creates a header around an existing schema.
    ///
    /// The coordinate fields keep the scale and offset they carry.
    pub fn with_schema(schema: Schema) -> Result<Header> {
        for id in [FieldId::X, FieldId::Y, FieldId::Z] {
            if !schema.has_field(id) {
                return Err(Error::InvalidFieldTable(format!(
                    "{id:?} dimension not on schema"
                )));
            }
        }
        let mut header = Header::new(PointFormat::default());
        header.schema = schema;
        header.point_data_offset = header.header_size() as u64;
        Ok(header)
    }

    /// Returns the version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the version.
    ///
    /// Only 1.0 is accepted.
    pub fn set_version(&mut self, version: Version) -> Result<()> {
        if version.is_supported() {
            self.version = version;
            Ok(())
        } else {
            Err(Error::Version(version))
        }
    }

    /// Returns the byte position where the point records begin.
    pub fn point_data_offset(&self) -> u64 {
        self.point_data_offset
    }

    /// Returns the length in bytes of each point record.
    pub fn data_record_length(&self) -> usize {
        self.schema.byte_size()
    }

    /// Returns the total number of point records.
    pub fn number_of_point_records(&self) -> u64 {
        self.number_of_point_records
    }

    /// Sets the total number of point records.
    pub fn set_number_of_point_records(&mut self, count: u64) {
        self.number_of_point_records = count;
    }

    /// Returns the number of returns recorded per pulse.
    pub fn return_count(&self) -> u32 {
        self.points_by_return.len() as u32
    }

    /// Sets the number of returns recorded per pulse.
    pub fn set_return_count(&mut self, count: u32) {
        self.points_by_return.resize(count as usize, 0);
    }

    /// Returns the point counts per return.
    pub fn points_by_return(&self) -> &[u64] {
        &self.points_by_return
    }

    /// Sets the point count for one return.
    pub fn set_point_records_by_return(&mut self, index: usize, count: u64) -> Result<()> {
        match self.points_by_return.get_mut(index) {
            Some(slot) => {
                *slot = count;
                Ok(())
            }
            None => Err(Error::InvalidPointData(format!(
                "return index {index} is beyond the return count {}",
                self.points_by_return.len()
            ))),
        }
    }

    /// Returns the coordinate scale factors.
    pub fn scale(&self) -> Vector<f64> {
        Vector::new(
            self.coordinate_field(FieldId::X).scale(),
            self.coordinate_field(FieldId::Y).scale(),
            self.coordinate_field(FieldId::Z).scale(),
        )
    }

    /// Sets the coordinate scale factors, propagating into the X, Y and Z
    /// fields.
    pub fn set_scale(&mut self, x: f64, y: f64, z: f64) {
        for (id, scale) in [(FieldId::X, x), (FieldId::Y, y), (FieldId::Z, z)] {
            if let Some(field) = self.schema.field_mut_by_id(id) {
                field.scale = Some(scale);
            }
        }
    }

    /// Returns the coordinate offsets.
    pub fn offset(&self) -> Vector<f64> {
        Vector::new(
            self.coordinate_field(FieldId::X).offset(),
            self.coordinate_field(FieldId::Y).offset(),
            self.coordinate_field(FieldId::Z).offset(),
        )
    }

    /// Sets the coordinate offsets, propagating into the X, Y and Z fields.
    pub fn set_offset(&mut self, x: f64, y: f64, z: f64) {
        for (id, offset) in [(FieldId::X, x), (FieldId::Y, y), (FieldId::Z, z)] {
            if let Some(field) = self.schema.field_mut_by_id(id) {
                field.offset = Some(offset);
            }
        }
    }

    /// Returns the global extents.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Sets the global extents.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    /// Grows the global extents to encompass an xyz position.
    pub(crate) fn grow_bounds(&mut self, x: f64, y: f64, z: f64) {
        self.bounds.grow(x, y, z);
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the schema mutably.
    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Replaces the schema.
    ///
    /// The coordinate fields are reset to scale 1.0 and offset 0.0. A schema
    /// without X, Y and Z dimensions is rejected.
    pub fn set_schema(&mut self, schema: Schema) -> Result<()> {
        for id in [FieldId::X, FieldId::Y, FieldId::Z] {
            if !schema.has_field(id) {
                return Err(Error::InvalidFieldTable(format!(
                    "{id:?} dimension not on schema"
                )));
            }
        }
        self.schema = schema;
        self.set_scale(1., 1., 1.);
        self.set_offset(0., 0., 0.);
        Ok(())
    }

    /// Changes the point format, rebuilding the schema's required fields.
    pub fn set_point_format(&mut self, point_format: PointFormat) {
        self.schema.set_point_format(point_format);
        self.set_scale(1., 1., 1.);
    }

    /// Is the point data compressed?
    ///
    /// This crate records the flag but defines no codec.
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    /// Sets whether the point data is compressed.
    pub fn set_compressed(&mut self, is_compressed: bool) {
        self.is_compressed = is_compressed;
    }

    /// Does this file carry waveform data?
    ///
    /// True when at least one waveform packet descriptor is present and the
    /// schema has the waveform address fields.
    pub fn has_waveform_data(&self) -> bool {
        !self.waveform_descriptors.is_empty()
            && self.schema.has_field(FieldId::ByteOffsetToWaveformData)
            && self.schema.has_field(FieldId::WaveformDataSize)
    }

    /// Appends a waveform packet descriptor.
    pub fn add_waveform_packet_desc(&mut self, descriptor: WaveformPacketDesc) {
        self.waveform_descriptors.push(descriptor);
    }

    /// Returns the waveform packet descriptors.
    pub fn waveform_descriptors(&self) -> &[WaveformPacketDesc] {
        &self.waveform_descriptors
    }

    /// Is waveform data stored inline in this file?
    pub fn is_internal_waveform_data(&self) -> bool {
        self.waveform_data_internal
    }

    /// Sets whether waveform data is stored inline.
    pub fn set_internal_waveform_data(&mut self, internal: bool) {
        self.waveform_data_internal = internal;
    }

    /// Is band data stored inline in this file?
    pub fn is_internal_band_data(&self) -> bool {
        self.band_data_internal
    }

    /// Sets whether band data is stored inline.
    pub fn set_internal_band_data(&mut self, internal: bool) {
        self.band_data_internal = internal;
    }

    /// Recomputes the field count and the point data offset.
    ///
    /// Call before serializing a header whose schema has been mutated.
    pub fn update_header(&mut self) {
        self.point_data_offset = self.header_size() as u64;
    }

    /// Returns the serialized size of this header in bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Header, PointFormat};
    /// let header = Header::new(PointFormat::new(0).unwrap());
    /// assert_eq!(header.header_size() as u64, header.point_data_offset());
    /// ```
    pub fn header_size(&self) -> usize {
        let fields: usize = self
            .schema
            .fields()
            .iter()
            .map(|field| 4 + FieldDefinition::serialized_size(field.data_type))
            .sum();
        FILE_HEADER_SIZE
            + self.points_by_return.len() * 8
            + BLOCK_DESC_SIZE
            + fields
            + self.waveform_descriptors.len() * WAVEFORM_PACKET_DESC_SIZE
            + RESERVED_BYTES_AFTER_FIELDS
    }

    /// Are two headers compatible?
    ///
    /// Compatible headers agree on return count, schema, and waveform
    /// descriptor count, so a file written with one can be updated in place
    /// through the other.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{Header, PointFormat};
    /// let a = Header::new(PointFormat::new(1).unwrap());
    /// let b = Header::new(PointFormat::new(1).unwrap());
    /// assert!(a.is_compatible(&b));
    /// ```
    pub fn is_compatible(&self, other: &Header) -> bool {
        self.return_count() == other.return_count()
            && self.schema == other.schema
            && self.waveform_descriptors.len() == other.waveform_descriptors.len()
    }

    /// Writes this header, including the field definitions and the reserved
    /// tail.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        let file_header = raw::FileHeader {
            file_signature: *b"HSPCD",
            major_version: self.version.major,
            minor_version: self.version.minor,
            byte_order: self.byte_order,
            number_of_point_records: self.number_of_point_records,
            point_data_offset: self.point_data_offset,
            x_min: self.bounds.min.x,
            x_max: self.bounds.max.x,
            y_min: self.bounds.min.y,
            y_max: self.bounds.max.y,
            z_min: self.bounds.min.z,
            z_max: self.bounds.max.z,
            number_of_returns: self.points_by_return.len() as u32,
        };
        file_header.write_to(&mut write)?;
        for &count in &self.points_by_return {
            write.write_u64::<LittleEndian>(count)?;
        }
        let block_desc = raw::BlockDesc {
            field_count: self.schema.field_count() as u32,
            field_def_encoding: self.field_def_encoding,
            character_encoding: self.character_encoding,
            number_of_waveform_packet_desc: self.waveform_descriptors.len() as u16,
            band_data_internal: self.band_data_internal,
            waveform_data_internal: self.waveform_data_internal,
        };
        block_desc.write_to(&mut write)?;
        for field in self.schema.fields() {
            write.write_u32::<LittleEndian>(field.id.to_u32())?;
            FieldDefinition::from_field(field).write_to(&mut write)?;
        }
        for descriptor in &self.waveform_descriptors {
            descriptor.write_to(&mut write)?;
        }
        write.write_all(&[0; RESERVED_BYTES_AFTER_FIELDS])?;
        Ok(())
    }

    /// Reads a header, re-materializing the schema from the field table.
    pub fn read_from<R: Read>(mut read: R) -> Result<Header> {
        let file_header = raw::FileHeader::read_from(&mut read)?;
        let version = Version::new(file_header.major_version, file_header.minor_version);
        if !version.is_supported() {
            return Err(Error::Version(version));
        }
        let mut points_by_return = Vec::with_capacity(file_header.number_of_returns as usize);
        for _ in 0..file_header.number_of_returns {
            points_by_return.push(read.read_u64::<LittleEndian>()?);
        }
        let block_desc = raw::BlockDesc::read_from(&mut read)?;
        let mut fields = Vec::with_capacity(block_desc.field_count as usize);
        for _ in 0..block_desc.field_count {
            let id = read.read_u32::<LittleEndian>()?;
            let id = FieldId::from_u32(id)
                .ok_or_else(|| Error::InvalidFieldTable(format!("unknown field id {id}")))?;
            let definition = FieldDefinition::read_from(&mut read)?;
            fields.push(definition.to_field(id)?);
        }
        let mut waveform_descriptors =
            Vec::with_capacity(block_desc.number_of_waveform_packet_desc as usize);
        for _ in 0..block_desc.number_of_waveform_packet_desc {
            waveform_descriptors.push(WaveformPacketDesc::read_from(&mut read)?);
        }
        let mut reserved = [0; RESERVED_BYTES_AFTER_FIELDS];
        read.read_exact(&mut reserved)?;
        Ok(Header {
            version,
            byte_order: file_header.byte_order,
            number_of_point_records: file_header.number_of_point_records,
            point_data_offset: file_header.point_data_offset,
            bounds: Bounds::new(
                file_header.x_min,
                file_header.y_min,
                file_header.z_min,
                file_header.x_max,
                file_header.y_max,
                file_header.z_max,
            ),
            points_by_return,
            field_def_encoding: block_desc.field_def_encoding,
            character_encoding: block_desc.character_encoding,
            band_data_internal: block_desc.band_data_internal,
            waveform_data_internal: block_desc.waveform_data_internal,
            waveform_descriptors,
            schema: Schema::from_loaded_fields(fields),
            is_compressed: false,
        })
    }

    fn coordinate_field(&self, id: FieldId) -> &Field {
        self.schema
            .fields_by_id(id)
            .first()
            .copied()
            .expect("every schema carries x, y and z")
    }
}

impl Default for Header {
    fn default() -> Header {
        Header::new(PointFormat::default())
    }
}

/// Returns the process-wide default header.
///
/// Points constructed without an explicit header share this one. It is
/// created on first use and never mutated.
///
/// # Examples
///
/// ```
/// let header = hspc::default_header();
/// assert_eq!(12, header.data_record_length());
/// ```
pub fn default_header() -> Arc<Header> {
    static DEFAULT_HEADER: OnceLock<Arc<Header>> = OnceLock::new();
    DEFAULT_HEADER
        .get_or_init(|| Arc::new(Header::default()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BandDesc;
    use crate::field::DataType;

    #[test]
    fn round_trip() {
        let mut header = Header::new(PointFormat::new(5).unwrap());
        header.set_return_count(3);
        header.set_point_records_by_return(1, 7).unwrap();
        header.set_scale(0.01, 0.01, 0.001);
        header.set_offset(100., 200., 0.);
        header.set_bounds(Bounds::new(0., 0., 0., 1., 2., 3.));
        header
            .schema_mut()
            .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 3)
            .unwrap();
        header.add_waveform_packet_desc(WaveformPacketDesc::new(0, 8, 0, 128, 10, 1., 0.));
        header.update_header();

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(header.point_data_offset(), bytes.len() as u64);

        let other = Header::read_from(bytes.as_slice()).unwrap();
        assert_eq!(header, other);
    }

    #[test]
    fn data_offset_tracks_schema() {
        let mut header = Header::default();
        let before = header.point_data_offset();
        header
            .schema_mut()
            .add_band(DataType::Double, "Band Value", "")
            .unwrap();
        header.update_header();
        // a double band costs 4 (id) + 88 + 3 * 8 bytes of header
        assert_eq!(before + 4 + 88 + 24, header.point_data_offset());
    }

    #[test]
    fn compatibility() {
        let mut a = Header::new(PointFormat::new(1).unwrap());
        let mut b = Header::new(PointFormat::new(1).unwrap());
        a.set_return_count(5);
        b.set_return_count(5);
        b.set_point_records_by_return(0, 99).unwrap();
        // per-return counts may differ
        assert!(a.is_compatible(&b));

        b.add_waveform_packet_desc(WaveformPacketDesc::default());
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn incompatible_schema() {
        let a = Header::new(PointFormat::new(1).unwrap());
        let mut b = Header::new(PointFormat::new(1).unwrap());
        b.schema_mut()
            .add_band(DataType::Short, "Band Value", "")
            .unwrap();
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn set_schema_requires_coordinates() {
        let mut header = Header::default();
        let mut schema = Schema::new(PointFormat::default());
        schema.remove_field(0).unwrap();
        assert!(header.set_schema(schema).is_err());
    }

    #[test]
    fn version_validation() {
        let mut header = Header::default();
        assert!(header.set_version(Version::new(1, 0)).is_ok());
        assert!(header.set_version(Version::new(1, 1)).is_err());
    }

    #[test]
    fn default_header_is_shared() {
        let a = default_header();
        let b = default_header();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
