//! Schema fields and their data types.
//!
//! A [Field] is one entry of the per-point record schema: an identifier, a
//! data type, a width in bits, and the layout and scaling metadata the
//! schema derives for it. Point record layouts are fully determined by the
//! ordered list of fields on a [Schema](crate::Schema).

use crate::{Error, Result};

/// The binary data types a field can have.
///
/// The discriminants are the on-disk type tags and must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    /// An arbitrary-width bit field.
    Bit = 0,
    /// An unsigned 8-bit integer.
    UnsignedChar = 1,
    /// A fixed-width character array, interpreted as a C string.
    Char = 2,
    /// An unsigned 16-bit integer.
    UnsignedShort = 3,
    /// A signed 16-bit integer.
    Short = 4,
    /// An unsigned 32-bit integer.
    UnsignedLong = 5,
    /// A signed 32-bit integer.
    Long = 6,
    /// An unsigned 64-bit integer.
    UnsignedLongLong = 7,
    /// A signed 64-bit integer.
    LongLong = 8,
    /// A 32-bit float.
    Float = 9,
    /// A 64-bit float.
    Double = 10,
    /// Reserved for future use.
    Reserved = 11,
    /// The type is not known.
    Unknown = 10000,
}

impl DataType {
    /// Creates a data type from its on-disk tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::field::DataType;
    /// assert_eq!(Some(DataType::Short), DataType::from_u8(4));
    /// assert_eq!(None, DataType::from_u8(42));
    /// ```
    pub fn from_u8(n: u8) -> Option<DataType> {
        match n {
            0 => Some(DataType::Bit),
            1 => Some(DataType::UnsignedChar),
            2 => Some(DataType::Char),
            3 => Some(DataType::UnsignedShort),
            4 => Some(DataType::Short),
            5 => Some(DataType::UnsignedLong),
            6 => Some(DataType::Long),
            7 => Some(DataType::UnsignedLongLong),
            8 => Some(DataType::LongLong),
            9 => Some(DataType::Float),
            10 => Some(DataType::Double),
            11 => Some(DataType::Reserved),
            _ => None,
        }
    }

    /// Returns the on-disk tag of this data type.
    pub fn to_u8(self) -> u8 {
        match self {
            DataType::Unknown => 255,
            _ => self as u8,
        }
    }

    /// Returns the size in bytes of one value of this type.
    ///
    /// Bit and Char report one byte, the unit in which their serialized
    /// range fields (no-data, minimum, maximum) are stored.
    pub fn size(self) -> usize {
        match self {
            DataType::Bit | DataType::UnsignedChar | DataType::Char => 1,
            DataType::UnsignedShort | DataType::Short => 2,
            DataType::UnsignedLong | DataType::Long | DataType::Float => 4,
            DataType::UnsignedLongLong | DataType::LongLong | DataType::Double => 8,
            DataType::Reserved | DataType::Unknown => 0,
        }
    }

    /// Is this a numeric type?
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            DataType::Bit | DataType::Char | DataType::Reserved | DataType::Unknown
        )
    }

    /// Is this an integer type?
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::UnsignedChar
                | DataType::UnsignedShort
                | DataType::Short
                | DataType::UnsignedLong
                | DataType::Long
                | DataType::UnsignedLongLong
                | DataType::LongLong
        )
    }

    /// Is this a signed type?
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::Short
                | DataType::Long
                | DataType::LongLong
                | DataType::Float
                | DataType::Double
                | DataType::Char
        )
    }
}

/// The closed set of field identifiers.
///
/// The discriminants are the on-disk u32 ids. `BandValue` may appear once
/// per spectral band; all other ids are unique within one schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    /// Id is not known.
    Unknown = 0,
    /// X coordinate, raw integer storage.
    X = 1,
    /// Y coordinate, raw integer storage.
    Y = 2,
    /// Z coordinate, raw integer storage.
    Z = 3,
    /// Pulse return magnitude.
    Intensity = 4,
    /// Pulse return number.
    ReturnNumber = 5,
    /// Total number of returns for the pulse.
    NumberOfReturns = 6,
    /// Classification flag bits.
    ClassificationFlags = 7,
    /// Scan mirror direction.
    ScanDirectionFlag = 8,
    /// Last point on a scan line before direction change.
    EdgeOfFlightLine = 9,
    /// Scanner channel.
    ScannerChannel = 10,
    /// ASPRS classification.
    Classification = 11,
    /// Scan angle rank.
    ScanAngleRank = 12,
    /// Originating file id.
    PointSourceId = 13,
    /// GNSS time tag.
    GnssTime = 14,
    /// One spectral band value; repeated per band.
    BandValue = 15,
    /// Red image channel.
    Red = 16,
    /// Green image channel.
    Green = 17,
    /// Blue image channel.
    Blue = 18,
    /// Near-infrared image channel.
    Nir = 19,
    /// Byte offset of the point's waveform payload.
    ByteOffsetToWaveformData = 20,
    /// Byte size of the point's waveform payload.
    WaveformDataSize = 21,
}

impl FieldId {
    /// Creates a field id from its on-disk u32.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::FieldId;
    /// assert_eq!(Some(FieldId::X), FieldId::from_u32(1));
    /// assert_eq!(None, FieldId::from_u32(99));
    /// ```
    pub fn from_u32(n: u32) -> Option<FieldId> {
        match n {
            0 => Some(FieldId::Unknown),
            1 => Some(FieldId::X),
            2 => Some(FieldId::Y),
            3 => Some(FieldId::Z),
            4 => Some(FieldId::Intensity),
            5 => Some(FieldId::ReturnNumber),
            6 => Some(FieldId::NumberOfReturns),
            7 => Some(FieldId::ClassificationFlags),
            8 => Some(FieldId::ScanDirectionFlag),
            9 => Some(FieldId::EdgeOfFlightLine),
            10 => Some(FieldId::ScannerChannel),
            11 => Some(FieldId::Classification),
            12 => Some(FieldId::ScanAngleRank),
            13 => Some(FieldId::PointSourceId),
            14 => Some(FieldId::GnssTime),
            15 => Some(FieldId::BandValue),
            16 => Some(FieldId::Red),
            17 => Some(FieldId::Green),
            18 => Some(FieldId::Blue),
            19 => Some(FieldId::Nir),
            20 => Some(FieldId::ByteOffsetToWaveformData),
            21 => Some(FieldId::WaveformDataSize),
            _ => None,
        }
    }

    /// Returns the on-disk u32 of this field id.
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

/// One entry of the per-point record schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// The field identifier.
    pub id: FieldId,
    /// Human-readable name, at most 32 bytes when serialized.
    pub name: String,
    /// The binary data type.
    pub data_type: DataType,
    /// The width of this field in bits.
    pub bit_size: usize,
    /// Human-readable description, at most 32 bytes when serialized.
    pub description: String,
    /// Is this field required by the schema's point format?
    pub required: bool,
    /// Is this field in use?
    pub active: bool,
    /// Is this field numeric?
    pub numeric: bool,
    /// Is this field signed? Only meaningful for numeric fields.
    pub signed: bool,
    /// Does this field interpret to an integer? Only meaningful for numeric
    /// fields.
    pub integer: bool,
    /// Minimum value statistic, as a double.
    pub min: f64,
    /// Maximum value statistic, as a double.
    pub max: f64,
    /// The scaling value, if scaling is applied.
    pub scale: Option<f64>,
    /// The offset value, if an offset is applied.
    pub offset: Option<f64>,
    /// Insertion-order position, assigned by the schema.
    pub position: u32,
    /// Byte offset within the record, assigned by the schema.
    pub byte_offset: usize,
    /// Bit offset within the starting byte, assigned by the schema.
    pub bit_offset: usize,
}

impl Field {
    /// Creates a new field.
    ///
    /// The bit size must be positive.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, Field, FieldId};
    /// let field = Field::new(FieldId::Intensity, "Intensity", DataType::UnsignedShort, 16).unwrap();
    /// assert_eq!(2, field.byte_size());
    /// assert!(Field::new(FieldId::Intensity, "Intensity", DataType::UnsignedShort, 0).is_err());
    /// ```
    pub fn new(id: FieldId, name: &str, data_type: DataType, bit_size: usize) -> Result<Field> {
        if bit_size == 0 {
            return Err(Error::InvalidFieldTable(format!(
                "field {name} has bit size zero"
            )));
        }
        Ok(Field {
            id,
            name: name.to_string(),
            data_type,
            bit_size,
            description: String::new(),
            required: false,
            active: false,
            numeric: data_type.is_numeric(),
            signed: data_type.is_signed(),
            integer: data_type.is_integer(),
            min: 0.,
            max: 0.,
            scale: None,
            offset: None,
            position: 0,
            byte_offset: 0,
            bit_offset: 0,
        })
    }

    /// Returns the physical size of this field in whole bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, Field, FieldId};
    /// let field = Field::new(FieldId::ReturnNumber, "Return Number", DataType::Bit, 4).unwrap();
    /// assert_eq!(1, field.byte_size());
    /// ```
    pub fn byte_size(&self) -> usize {
        self.bit_size.div_ceil(8)
    }

    /// Is scaling applied to this field?
    ///
    /// Bit, Char and Unknown fields never scale.
    pub fn is_scaled(&self) -> bool {
        self.scale.is_some() && self.supports_scaling()
    }

    /// Is an offset applied to this field?
    pub fn is_offset(&self) -> bool {
        self.offset.is_some() && self.supports_scaling()
    }

    /// Returns the scale to apply, 1.0 when none is set.
    pub fn scale(&self) -> f64 {
        if self.supports_scaling() {
            self.scale.unwrap_or(1.)
        } else {
            1.
        }
    }

    /// Returns the offset to apply, 0.0 when none is set.
    pub fn offset(&self) -> f64 {
        if self.supports_scaling() {
            self.offset.unwrap_or(0.)
        } else {
            0.
        }
    }

    /// Is this field well-formed?
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && self.bit_size != 0
            && self.data_type != DataType::Unknown
            && self.data_type != DataType::Reserved
    }

    fn supports_scaling(&self) -> bool {
        !matches!(
            self.data_type,
            DataType::Bit | DataType::Char | DataType::Unknown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_rounds_up() {
        let field = Field::new(FieldId::Unknown, "bits", DataType::Bit, 9).unwrap();
        assert_eq!(2, field.byte_size());
        let field = Field::new(FieldId::Unknown, "bits", DataType::Bit, 8).unwrap();
        assert_eq!(1, field.byte_size());
    }

    #[test]
    fn bit_fields_never_scale() {
        let mut field = Field::new(FieldId::ReturnNumber, "Return Number", DataType::Bit, 4).unwrap();
        field.scale = Some(0.5);
        assert!(!field.is_scaled());
        assert_eq!(1., field.scale());
    }

    #[test]
    fn data_type_tags_round_trip() {
        for tag in 0..12 {
            let data_type = DataType::from_u8(tag).unwrap();
            assert_eq!(tag, data_type.to_u8());
        }
    }

    #[test]
    fn field_id_round_trip() {
        for n in 0..22 {
            let id = FieldId::from_u32(n).unwrap();
            assert_eq!(n, id.to_u32());
        }
    }
}
