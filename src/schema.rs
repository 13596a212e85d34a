//! Point record schemas.
//!
//! A [Schema] is the ordered table of [Field]s that fully determines the
//! binary layout of a point record. Schemas are usually created from one of
//! the nine point format presets and then extended with spectral bands:
//!
//! ```
//! use hspc::{field::DataType, schema::BandDesc, PointFormat, Schema};
//!
//! let mut schema = Schema::new(PointFormat::new(0).unwrap());
//! assert_eq!(12, schema.byte_size()); // x, y, z as 32-bit integers
//!
//! schema.add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 3).unwrap();
//! assert_eq!(18, schema.byte_size());
//! ```

use crate::{field::DataType, Error, Field, FieldId, Result};
use std::collections::HashMap;

/// A point format preset.
///
/// The nine presets 0..8 enumerate which groups of required fields a record
/// carries. A new format can be created from its code and converted back:
///
/// ```
/// use hspc::PointFormat;
///
/// let format = PointFormat::new(5).unwrap();
/// assert!(format.has_waveform);
/// assert_eq!(5, format.to_u8().unwrap());
///
/// assert!(PointFormat::new(9).is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointFormat {
    /// Does this format include the ASPRS basic attributes (intensity,
    /// returns, classification, scan metadata)?
    pub has_asprs_basic: bool,
    /// Does this format include GNSS time?
    pub has_gnss_time: bool,
    /// Does this format include RGB color?
    pub has_color: bool,
    /// Does this format include a near-infrared channel?
    pub has_nir: bool,
    /// Does this format include the waveform address fields?
    pub has_waveform: bool,
}

impl PointFormat {
    /// Creates a point format from its preset number.
    pub fn new(n: u8) -> Result<PointFormat> {
        let format = match n {
            0 => PointFormat::default(),
            1 => PointFormat {
                has_asprs_basic: true,
                ..Default::default()
            },
            2 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                ..Default::default()
            },
            3 => PointFormat {
                has_asprs_basic: true,
                has_color: true,
                ..Default::default()
            },
            4 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                has_color: true,
                ..Default::default()
            },
            5 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                has_waveform: true,
                ..Default::default()
            },
            6 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                has_color: true,
                has_waveform: true,
                ..Default::default()
            },
            7 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                has_color: true,
                has_nir: true,
                ..Default::default()
            },
            8 => PointFormat {
                has_asprs_basic: true,
                has_gnss_time: true,
                has_color: true,
                has_nir: true,
                has_waveform: true,
            },
            _ => {
                return Err(Error::InvalidFieldTable(format!(
                    "unhandled point format {n}"
                )))
            }
        };
        Ok(format)
    }

    /// Converts this point format back to its preset number.
    ///
    /// Returns an error for attribute combinations that don't map to one of
    /// the nine presets.
    pub fn to_u8(&self) -> Result<u8> {
        for n in 0..=8 {
            if PointFormat::new(n).unwrap() == *self {
                return Ok(n);
            }
        }
        Err(Error::InvalidFieldTable(format!(
            "point format attributes do not match a preset: {self:?}"
        )))
    }
}

/// The description of one spectral band to be added to a schema.
#[derive(Clone, Debug, PartialEq)]
pub struct BandDesc {
    /// The band's data type.
    pub data_type: DataType,
    /// The band's name.
    pub name: String,
    /// The band's description.
    pub description: String,
}

impl BandDesc {
    /// Creates a new band description.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, schema::BandDesc};
    /// let band = BandDesc::new(DataType::Short, "Band Value", "");
    /// ```
    pub fn new(data_type: DataType, name: &str, description: &str) -> BandDesc {
        BandDesc {
            data_type,
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// An ordered collection of fields describing one point record.
#[derive(Clone, Debug)]
pub struct Schema {
    point_format: PointFormat,
    fields: Vec<Field>,
    next_position: u32,
    bit_size: usize,
    base_bit_size: usize,
    by_name: HashMap<String, Vec<usize>>,
    by_id: HashMap<FieldId, Vec<usize>>,
}

impl Schema {
    /// Creates a schema holding the preset's required fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{PointFormat, Schema};
    /// let schema = Schema::new(PointFormat::new(1).unwrap());
    /// assert_eq!(13, schema.field_count());
    /// ```
    pub fn new(point_format: PointFormat) -> Schema {
        let mut schema = Schema::empty();
        schema.point_format = point_format;
        schema.update_required_fields(point_format);
        schema
    }

    /// Creates a schema with no fields at all.
    pub(crate) fn empty() -> Schema {
        Schema {
            point_format: PointFormat::default(),
            fields: Vec::new(),
            next_position: 0,
            bit_size: 0,
            base_bit_size: 0,
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Rebuilds a schema from fields recovered from a file's field table.
    ///
    /// The point format is inferred from the recovered ids and the preset
    /// fields are re-marked required.
    pub(crate) fn from_loaded_fields(fields: Vec<Field>) -> Schema {
        let mut schema = Schema::empty();
        for mut field in fields {
            field.active = true;
            schema.add_field(field);
        }
        let point_format = PointFormat {
            has_asprs_basic: schema.has_field(FieldId::Intensity)
                && schema.has_field(FieldId::ReturnNumber),
            has_gnss_time: schema.has_field(FieldId::GnssTime),
            has_color: schema.has_field(FieldId::Red)
                && schema.has_field(FieldId::Green)
                && schema.has_field(FieldId::Blue),
            has_nir: schema.has_field(FieldId::Nir),
            has_waveform: schema.has_field(FieldId::ByteOffsetToWaveformData)
                && schema.has_field(FieldId::WaveformDataSize),
        };
        schema.point_format = point_format;
        let required = required_ids(point_format);
        let skeleton = Schema::new(point_format);
        for field in &mut schema.fields {
            field.required = field.id != FieldId::BandValue && required.contains(&field.id);
            // The numeric flags are conventions of the preset skeleton, not
            // part of the serialized definition.
            if field.required {
                if let Some(preset) = skeleton.by_id.get(&field.id).and_then(|v| v.first()) {
                    let preset = &skeleton.fields[*preset];
                    field.numeric = preset.numeric;
                    field.integer = preset.integer;
                    field.signed = preset.signed;
                }
            }
        }
        schema.calculate_sizes();
        schema
    }

    /// Returns this schema's point format.
    pub fn point_format(&self) -> PointFormat {
        self.point_format
    }

    /// Replaces the required fields with the new preset's skeleton.
    ///
    /// Fields the user added are preserved, re-appended in their original
    /// position order so insertion order remains stable.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, schema::BandDesc, PointFormat, Schema};
    /// let mut schema = Schema::new(PointFormat::new(0).unwrap());
    /// schema.add_bands(&BandDesc::new(DataType::UnsignedChar, "b", ""), 2).unwrap();
    /// schema.set_point_format(PointFormat::new(1).unwrap());
    /// assert_eq!(2, schema.band_count());
    /// ```
    pub fn set_point_format(&mut self, point_format: PointFormat) {
        self.update_required_fields(point_format);
        self.point_format = point_format;
    }

    /// Adds a field, assigning it the next position index.
    ///
    /// Bit and byte offsets of every field are recomputed.
    pub fn add_field(&mut self, field: Field) {
        let mut field = field;
        field.position = self.next_position;
        self.next_position += 1;
        self.fields.push(field);
        self.calculate_sizes();
    }

    /// Removes the field at a sequence index, rebuilding offsets.
    pub fn remove_field(&mut self, index: usize) -> Result<()> {
        if index >= self.fields.len() {
            return Err(Error::MissingFieldIndex(index));
        }
        let _ = self.fields.remove(index);
        self.calculate_sizes();
        Ok(())
    }

    /// Appends one spectral band field of the given type.
    ///
    /// The band is active, numeric, not required, and carries no scale or
    /// offset. Only fixed-width numeric types are allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, PointFormat, Schema};
    /// let mut schema = Schema::new(PointFormat::new(0).unwrap());
    /// schema.add_band(DataType::Short, "Band Value", "").unwrap();
    /// assert!(schema.add_band(DataType::Bit, "bad", "").is_err());
    /// ```
    pub fn add_band(&mut self, data_type: DataType, name: &str, description: &str) -> Result<()> {
        let bits = match data_type {
            DataType::UnsignedChar => 8,
            DataType::Short | DataType::UnsignedShort => 16,
            DataType::Long | DataType::UnsignedLong | DataType::Float => 32,
            DataType::LongLong | DataType::UnsignedLongLong | DataType::Double => 64,
            _ => return Err(Error::InvalidBandDataType(data_type)),
        };
        let mut band = Field::new(FieldId::BandValue, name, data_type, bits)?;
        band.description = description.to_string();
        band.required = false;
        band.active = true;
        band.numeric = true;
        band.integer = data_type.is_integer();
        band.signed = data_type.is_signed();
        self.add_field(band);
        Ok(())
    }

    /// Appends `count` spectral band fields sharing one description.
    pub fn add_bands(&mut self, band: &BandDesc, count: usize) -> Result<()> {
        for _ in 0..count {
            self.add_band(band.data_type, &band.name, &band.description)?;
        }
        Ok(())
    }

    /// Removes the n-th band field.
    ///
    /// Returns true if a band was removed, false if there is no n-th band.
    pub fn remove_band(&mut self, n: usize) -> bool {
        match self.nth_index(FieldId::BandValue, n) {
            Some(index) => self.remove_field(index).is_ok(),
            None => false,
        }
    }

    /// Removes every band field.
    pub fn remove_all_bands(&mut self) {
        while self.remove_band(0) {}
    }

    /// Returns the field at a sequence index.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Returns every field in sequence order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns every field with the given id, in sequence order.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{FieldId, PointFormat, Schema};
    /// let schema = Schema::new(PointFormat::new(0).unwrap());
    /// assert_eq!(1, schema.fields_by_id(FieldId::X).len());
    /// assert!(schema.fields_by_id(FieldId::Intensity).is_empty());
    /// ```
    pub fn fields_by_id(&self, id: FieldId) -> Vec<&Field> {
        self.by_id
            .get(&id)
            .map(|indices| indices.iter().map(|&i| &self.fields[i]).collect())
            .unwrap_or_default()
    }

    /// Returns every field with the given name, in sequence order.
    pub fn fields_by_name(&self, name: &str) -> Vec<&Field> {
        self.by_name
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.fields[i]).collect())
            .unwrap_or_default()
    }

    /// Does this schema have a field with the given id?
    pub fn has_field(&self, id: FieldId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Returns the first field with the given id, mutably.
    ///
    /// Layout can't be changed through this handle, only metadata such as
    /// scale and offset.
    pub(crate) fn field_mut_by_id(&mut self, id: FieldId) -> Option<&mut Field> {
        let index = self.by_id.get(&id).and_then(|indices| indices.first())?;
        self.fields.get_mut(*index)
    }

    /// Returns the number of fields with the given id.
    pub fn field_count_by_id(&self, id: FieldId) -> usize {
        self.by_id.get(&id).map(Vec::len).unwrap_or(0)
    }

    /// Returns the sequence index of the n-th field with the given id.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{FieldId, PointFormat, Schema};
    /// let schema = Schema::new(PointFormat::new(0).unwrap());
    /// assert_eq!(Some(2), schema.nth_index(FieldId::Z, 0));
    /// assert_eq!(None, schema.nth_index(FieldId::Z, 1));
    /// ```
    pub fn nth_index(&self, id: FieldId, n: usize) -> Option<usize> {
        self.by_id.get(&id).and_then(|indices| indices.get(n)).copied()
    }

    /// Returns the names of every field in sequence order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the number of spectral bands.
    pub fn band_count(&self) -> usize {
        self.field_count_by_id(FieldId::BandValue)
    }

    /// Returns the n-th band field.
    pub fn band(&self, n: usize) -> Option<&Field> {
        self.nth_index(FieldId::BandValue, n)
            .and_then(|index| self.field(index))
    }

    /// Returns a description of every band in sequence order.
    pub fn band_descs(&self) -> Vec<BandDesc> {
        self.fields_by_id(FieldId::BandValue)
            .iter()
            .map(|band| BandDesc::new(band.data_type, &band.name, &band.description))
            .collect()
    }

    /// Returns the total record size in bits.
    pub fn bit_size(&self) -> usize {
        self.bit_size
    }

    /// Returns the total record size in whole bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{PointFormat, Schema};
    /// let schema = Schema::new(PointFormat::new(0).unwrap());
    /// assert_eq!(12, schema.byte_size());
    /// ```
    pub fn byte_size(&self) -> usize {
        self.bit_size.div_ceil(8)
    }

    /// Returns the size of the required fields only, in whole bytes.
    pub fn base_byte_size(&self) -> usize {
        self.base_bit_size.div_ceil(8)
    }

    /// Does this schema have fields beyond its point format's skeleton?
    pub fn is_custom(&self) -> bool {
        self.fields.iter().any(|field| !field.required)
    }

    /// Recomputes every field's byte and bit offset and the schema sizes.
    ///
    /// Walks the sequence with a byte/bit cursor. A field whose width does
    /// not reach a byte boundary leaves the byte cursor in place, so
    /// sub-byte fields share a byte; within that byte, later fields occupy
    /// higher bit positions.
    pub fn calculate_sizes(&mut self) {
        self.bit_size = 0;
        self.base_bit_size = 0;
        let mut byte_offset = 0;
        let mut bit_offset = 0;
        for field in &mut self.fields {
            self.bit_size += field.bit_size;
            bit_offset += field.bit_size % 8;
            field.byte_offset = byte_offset;
            field.bit_offset = bit_offset;
            if bit_offset % 8 == 0 {
                bit_offset = 0;
                byte_offset += field.byte_size();
            }
            if field.required {
                self.base_bit_size += field.bit_size;
            }
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        for (index, field) in self.fields.iter().enumerate() {
            self.by_name
                .entry(field.name.clone())
                .or_default()
                .push(index);
            self.by_id.entry(field.id).or_default().push(index);
        }
    }

    fn update_required_fields(&mut self, point_format: PointFormat) {
        // Keep any non-required fields the user may have added and re-add
        // them after the preset skeleton, in their original position order.
        let mut user_fields: Vec<Field> = self
            .fields
            .iter()
            .filter(|field| !field.required)
            .cloned()
            .collect();
        user_fields.sort_by_key(|field| field.position);

        self.fields.clear();
        self.next_position = 0;

        self.add_xyz();
        if point_format.has_asprs_basic {
            self.add_asprs_basic_fields();
        }
        if point_format.has_gnss_time {
            self.add_time();
        }
        if point_format.has_color {
            self.add_color();
        }
        if point_format.has_nir {
            self.add_nir();
        }
        if point_format.has_waveform {
            self.add_waveform();
        }

        for field in user_fields {
            self.add_field(field);
        }
        self.calculate_sizes();
    }

    fn add_required(&mut self, mut field: Field) {
        field.required = true;
        field.active = true;
        self.add_field(field);
    }

    fn add_xyz(&mut self) {
        for (id, name) in [(FieldId::X, "X"), (FieldId::Y, "Y"), (FieldId::Z, "Z")] {
            let mut field =
                Field::new(id, name, DataType::UnsignedLong, 32).expect("nonzero bit size");
            field.description = format!("{name} coordinate, scaled integer");
            field.integer = true;
            field.numeric = true;
            field.signed = true;
            self.add_required(field);
        }
    }

    fn add_asprs_basic_fields(&mut self) {
        let mut intensity =
            Field::new(FieldId::Intensity, "Intensity", DataType::UnsignedShort, 16)
                .expect("nonzero bit size");
        intensity.description = "pulse return magnitude".to_string();
        intensity.integer = true;
        intensity.numeric = true;
        self.add_required(intensity);

        let mut return_number =
            Field::new(FieldId::ReturnNumber, "Return Number", DataType::Bit, 4)
                .expect("nonzero bit size");
        return_number.description = "pulse return number".to_string();
        return_number.numeric = true;
        return_number.integer = true;
        self.add_required(return_number);

        let mut number_of_returns = Field::new(
            FieldId::NumberOfReturns,
            "Number of Returns",
            DataType::Bit,
            4,
        )
        .expect("nonzero bit size");
        number_of_returns.description = "total returns for this pulse".to_string();
        number_of_returns.numeric = true;
        number_of_returns.integer = true;
        self.add_required(number_of_returns);

        let mut classification_flags = Field::new(
            FieldId::ClassificationFlags,
            "Classification Flags",
            DataType::Bit,
            6,
        )
        .expect("nonzero bit size");
        classification_flags.description = "classification flag bits".to_string();
        classification_flags.numeric = true;
        classification_flags.integer = true;
        self.add_required(classification_flags);

        let mut scan_direction = Field::new(
            FieldId::ScanDirectionFlag,
            "Scan Direction",
            DataType::Bit,
            1,
        )
        .expect("nonzero bit size");
        scan_direction.description = "scan mirror direction".to_string();
        scan_direction.numeric = true;
        scan_direction.integer = true;
        self.add_required(scan_direction);

        let mut edge = Field::new(
            FieldId::EdgeOfFlightLine,
            "Flightline Edge",
            DataType::Bit,
            1,
        )
        .expect("nonzero bit size");
        edge.description = "last point before scan reverses".to_string();
        edge.numeric = true;
        edge.integer = true;
        self.add_required(edge);

        let mut scanner_channel = Field::new(
            FieldId::ScannerChannel,
            "Scanner Channel",
            DataType::UnsignedChar,
            8,
        )
        .expect("nonzero bit size");
        scanner_channel.description = "scanner head channel".to_string();
        scanner_channel.numeric = true;
        scanner_channel.integer = true;
        self.add_required(scanner_channel);

        let mut classification = Field::new(
            FieldId::Classification,
            "Classification",
            DataType::UnsignedChar,
            8,
        )
        .expect("nonzero bit size");
        classification.description = "ASPRS classification".to_string();
        classification.numeric = true;
        classification.integer = true;
        self.add_required(classification);

        let mut scan_angle = Field::new(
            FieldId::ScanAngleRank,
            "Scan Angle Rank",
            DataType::UnsignedChar,
            8,
        )
        .expect("nonzero bit size");
        scan_angle.description = "scan angle, -90 to +90 degrees".to_string();
        scan_angle.signed = true;
        scan_angle.integer = true;
        scan_angle.numeric = true;
        self.add_required(scan_angle);

        let mut point_source_id = Field::new(
            FieldId::PointSourceId,
            "Point Source ID",
            DataType::UnsignedShort,
            16,
        )
        .expect("nonzero bit size");
        point_source_id.description = "file this point originated from".to_string();
        point_source_id.integer = true;
        point_source_id.numeric = true;
        self.add_required(point_source_id);
    }

    fn add_time(&mut self) {
        let mut time =
            Field::new(FieldId::GnssTime, "Time", DataType::Double, 64).expect("nonzero bit size");
        time.description = "GNSS time tag of acquisition".to_string();
        time.numeric = true;
        self.add_required(time);
    }

    fn add_color(&mut self) {
        for (id, name) in [
            (FieldId::Red, "Red"),
            (FieldId::Green, "Green"),
            (FieldId::Blue, "Blue"),
        ] {
            let mut field =
                Field::new(id, name, DataType::UnsignedShort, 16).expect("nonzero bit size");
            field.description = format!("{name} image channel");
            field.integer = true;
            field.numeric = true;
            self.add_required(field);
        }
    }

    fn add_nir(&mut self) {
        let mut nir =
            Field::new(FieldId::Nir, "NIR", DataType::UnsignedShort, 16).expect("nonzero bit size");
        nir.description = "near infrared image channel".to_string();
        nir.integer = true;
        nir.numeric = true;
        self.add_required(nir);
    }

    fn add_waveform(&mut self) {
        let mut byte_offset = Field::new(
            FieldId::ByteOffsetToWaveformData,
            "WaveformOffset",
            DataType::UnsignedLongLong,
            64,
        )
        .expect("nonzero bit size");
        byte_offset.description = "byte offset of waveform data".to_string();
        byte_offset.integer = true;
        byte_offset.numeric = true;
        self.add_required(byte_offset);

        let mut size = Field::new(
            FieldId::WaveformDataSize,
            "WaveformSize",
            DataType::UnsignedLong,
            32,
        )
        .expect("nonzero bit size");
        size.description = "byte size of waveform data".to_string();
        size.integer = true;
        size.numeric = true;
        self.add_required(size);
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Schema) -> bool {
        self.fields == other.fields
    }
}

fn required_ids(point_format: PointFormat) -> Vec<FieldId> {
    let mut ids = vec![FieldId::X, FieldId::Y, FieldId::Z];
    if point_format.has_asprs_basic {
        ids.extend([
            FieldId::Intensity,
            FieldId::ReturnNumber,
            FieldId::NumberOfReturns,
            FieldId::ClassificationFlags,
            FieldId::ScanDirectionFlag,
            FieldId::EdgeOfFlightLine,
            FieldId::ScannerChannel,
            FieldId::Classification,
            FieldId::ScanAngleRank,
            FieldId::PointSourceId,
        ]);
    }
    if point_format.has_gnss_time {
        ids.push(FieldId::GnssTime);
    }
    if point_format.has_color {
        ids.extend([FieldId::Red, FieldId::Green, FieldId::Blue]);
    }
    if point_format.has_nir {
        ids.push(FieldId::Nir);
    }
    if point_format.has_waveform {
        ids.extend([FieldId::ByteOffsetToWaveformData, FieldId::WaveformDataSize]);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(n: u8) -> Schema {
        Schema::new(PointFormat::new(n).unwrap())
    }

    #[test]
    fn format_zero_is_three_longs() {
        let schema = schema(0);
        assert_eq!(3, schema.field_count());
        assert_eq!(96, schema.bit_size());
        assert_eq!(12, schema.byte_size());
        assert_eq!(12, schema.base_byte_size());
    }

    #[test]
    fn format_one_packs_flag_bits() {
        let schema = schema(1);
        // x, y, z, intensity, then two bytes of packed bit fields.
        let return_number = schema.fields_by_id(FieldId::ReturnNumber)[0];
        let number_of_returns = schema.fields_by_id(FieldId::NumberOfReturns)[0];
        assert_eq!(14, return_number.byte_offset);
        assert_eq!(4, return_number.bit_offset);
        assert_eq!(14, number_of_returns.byte_offset);
        assert_eq!(8, number_of_returns.bit_offset);

        let flags = schema.fields_by_id(FieldId::ClassificationFlags)[0];
        let scan_direction = schema.fields_by_id(FieldId::ScanDirectionFlag)[0];
        let edge = schema.fields_by_id(FieldId::EdgeOfFlightLine)[0];
        assert_eq!(15, flags.byte_offset);
        assert_eq!(6, flags.bit_offset);
        assert_eq!(15, scan_direction.byte_offset);
        assert_eq!(7, scan_direction.bit_offset);
        assert_eq!(15, edge.byte_offset);
        assert_eq!(8, edge.bit_offset);

        let scanner_channel = schema.fields_by_id(FieldId::ScannerChannel)[0];
        assert_eq!(16, scanner_channel.byte_offset);
    }

    #[test]
    fn bit_size_is_sum_of_fields() {
        for n in 0..=8 {
            let schema = schema(n);
            let total: usize = schema.fields().iter().map(|f| f.bit_size).sum();
            assert_eq!(total, schema.bit_size());
            assert_eq!(schema.bit_size().div_ceil(8), schema.byte_size());
        }
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut schema = schema(0);
        let count = schema.field_count();
        let field = Field::new(FieldId::Unknown, "user", DataType::Float, 32).unwrap();
        schema.add_field(field.clone());
        let added = schema.field(count).unwrap();
        assert_eq!("user", added.name);
        assert_eq!(count as u32, added.position);
    }

    #[test]
    fn add_and_remove_bands() {
        let mut schema = schema(0);
        schema
            .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 3)
            .unwrap();
        assert_eq!(3, schema.band_count());
        assert_eq!(12 + 6, schema.byte_size());
        assert_eq!(12, schema.base_byte_size());
        assert!(schema.is_custom());

        assert!(schema.remove_band(1));
        assert_eq!(2, schema.band_count());
        assert_eq!(12 + 4, schema.byte_size());
        assert!(!schema.remove_band(5));

        schema.remove_all_bands();
        assert_eq!(0, schema.band_count());
        assert_eq!(12, schema.byte_size());
    }

    #[test]
    fn band_type_must_be_fixed_width_numeric() {
        let mut schema = schema(0);
        assert!(matches!(
            schema.add_band(DataType::Bit, "bad", ""),
            Err(Error::InvalidBandDataType(DataType::Bit))
        ));
        assert!(schema.add_band(DataType::Char, "bad", "").is_err());
    }

    #[test]
    fn set_point_format_preserves_user_fields() {
        let mut schema = schema(5);
        schema
            .add_bands(&BandDesc::new(DataType::UnsignedShort, "Band Value", ""), 2)
            .unwrap();
        schema.set_point_format(PointFormat::new(1).unwrap());
        assert_eq!(2, schema.band_count());
        assert!(!schema.has_field(FieldId::GnssTime));
        // Bands land after the new skeleton.
        let last = schema.field(schema.field_count() - 1).unwrap();
        assert_eq!(FieldId::BandValue, last.id);
    }

    #[test]
    fn nth_index_finds_bands() {
        let mut schema = schema(0);
        schema
            .add_bands(&BandDesc::new(DataType::UnsignedChar, "Band Value", ""), 3)
            .unwrap();
        assert_eq!(Some(3), schema.nth_index(FieldId::BandValue, 0));
        assert_eq!(Some(5), schema.nth_index(FieldId::BandValue, 2));
        assert_eq!(None, schema.nth_index(FieldId::BandValue, 3));
    }

    #[test]
    fn lookup_by_name() {
        let schema = schema(2);
        assert_eq!(1, schema.fields_by_name("Time").len());
        assert!(schema.fields_by_name("nope").is_empty());
    }

    #[test]
    fn equality_is_field_by_field() {
        let a = schema(2);
        let b = schema(2);
        assert_eq!(a, b);
        let mut c = schema(2);
        c.add_band(DataType::Short, "Band Value", "").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn loaded_fields_infer_format() {
        let source = schema(5);
        let schema = Schema::from_loaded_fields(source.fields().to_vec());
        assert_eq!(5, schema.point_format().to_u8().unwrap());
        assert!(schema.fields_by_id(FieldId::X)[0].required);
    }
}
