//! Serialized field definitions.
//!
//! Each field of the schema is stored in the header as a `u32` field id
//! followed by a [FieldDefinition], a tagged structure whose no-data,
//! minimum and maximum slots vary in size with the data type. The leading
//! type byte selects the payload width on read.

use crate::{
    field::DataType,
    utils::{read_fixed_string, write_fixed_string},
    Error, Field, FieldId, Result,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const NAME_LENGTH: usize = 32;
const DESCRIPTION_LENGTH: usize = 32;

// options bit 0 marks the no-data slot valid; nothing here sets it
const MIN_BIT: u8 = 0x02;
const MAX_BIT: u8 = 0x04;
const SCALE_BIT: u8 = 0x08;
const OFFSET_BIT: u8 = 0x10;
const SIZE_IN_BITS_BIT: u8 = 0x20;

/// The size of a field definition without its three type-sized range slots.
const BASIC_SIZE: usize = 88;

/// A serialized field definition.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefinition {
    /// The data type, which also selects the width of the range slots.
    pub data_type: DataType,
    /// Which of the optional members carry meaning.
    pub options: u8,
    /// The field name.
    pub name: String,
    /// The field width in bits.
    pub size_in_bits: u32,
    /// The no-data marker value.
    pub no_data: f64,
    /// The minimum value statistic.
    pub min: f64,
    /// The maximum value statistic.
    pub max: f64,
    /// The scaling value.
    pub scale: f64,
    /// The offset value.
    pub offset: f64,
    /// The field description.
    pub description: String,
}

impl FieldDefinition {
    /// Returns the serialized size in bytes of a definition of this type.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::{field::DataType, raw::FieldDefinition};
    /// assert_eq!(91, FieldDefinition::serialized_size(DataType::Bit));
    /// assert_eq!(112, FieldDefinition::serialized_size(DataType::Double));
    /// ```
    pub fn serialized_size(data_type: DataType) -> usize {
        BASIC_SIZE + 3 * data_type.size()
    }

    /// Reads a field definition, selecting the range slot width from the
    /// leading type byte.
    pub fn read_from<R: Read>(mut read: R) -> Result<FieldDefinition> {
        let tag = read.read_u8()?;
        let data_type = DataType::from_u8(tag)
            .ok_or_else(|| Error::InvalidFieldTable(format!("unknown data type tag {tag}")))?;
        let options = read.read_u8()?;
        let mut reserved = [0; 2];
        read.read_exact(&mut reserved)?;
        let name = read_fixed_string(&mut read, NAME_LENGTH)?;
        let size_in_bits = read.read_u32::<LittleEndian>()?;
        let no_data = read_range_value(&mut read, data_type)?;
        let min = read_range_value(&mut read, data_type)?;
        let max = read_range_value(&mut read, data_type)?;
        let scale = read.read_f64::<LittleEndian>()?;
        let offset = read.read_f64::<LittleEndian>()?;
        let description = read_fixed_string(&mut read, DESCRIPTION_LENGTH)?;
        Ok(FieldDefinition {
            data_type,
            options,
            name,
            size_in_bits,
            no_data,
            min,
            max,
            scale,
            offset,
            description,
        })
    }

    /// Writes this field definition.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u8(self.data_type.to_u8())?;
        write.write_u8(self.options)?;
        write.write_all(&[0; 2])?;
        write_fixed_string(&mut write, &self.name, NAME_LENGTH)?;
        write.write_u32::<LittleEndian>(self.size_in_bits)?;
        write_range_value(&mut write, self.data_type, self.no_data)?;
        write_range_value(&mut write, self.data_type, self.min)?;
        write_range_value(&mut write, self.data_type, self.max)?;
        write.write_f64::<LittleEndian>(self.scale)?;
        write.write_f64::<LittleEndian>(self.offset)?;
        write_fixed_string(&mut write, &self.description, DESCRIPTION_LENGTH)?;
        Ok(())
    }

    /// Converts a schema field into its serialized definition.
    pub fn from_field(field: &Field) -> FieldDefinition {
        let mut options = SIZE_IN_BITS_BIT | MIN_BIT | MAX_BIT;
        if field.is_scaled() {
            options |= SCALE_BIT;
        }
        if field.is_offset() {
            options |= OFFSET_BIT;
        }
        FieldDefinition {
            data_type: field.data_type,
            options,
            name: field.name.clone(),
            size_in_bits: field.bit_size as u32,
            no_data: 0.,
            min: field.min,
            max: field.max,
            scale: if field.is_scaled() { field.scale() } else { 0. },
            offset: if field.is_offset() { field.offset() } else { 0. },
            description: field.description.clone(),
        }
    }

    /// Converts this definition back into a schema field.
    ///
    /// Numeric flags are derived from the data type; the preset skeleton
    /// conventions are re-applied by the schema when a whole field table is
    /// loaded.
    pub fn to_field(&self, id: FieldId) -> Result<Field> {
        let bit_size = if self.options & SIZE_IN_BITS_BIT != 0 {
            self.size_in_bits as usize
        } else {
            self.data_type.size() * 8
        };
        if self.data_type != DataType::Bit && bit_size > self.data_type.size() * 8 {
            return Err(Error::InvalidFieldTable(format!(
                "field {} is {} bits wide but its type holds {}",
                self.name,
                bit_size,
                self.data_type.size() * 8
            )));
        }
        let mut field = Field::new(id, &self.name, self.data_type, bit_size)?;
        field.description = self.description.clone();
        if self.options & MIN_BIT != 0 {
            field.min = self.min;
        }
        if self.options & MAX_BIT != 0 {
            field.max = self.max;
        }
        if self.options & SCALE_BIT != 0 {
            field.scale = Some(self.scale);
        }
        if self.options & OFFSET_BIT != 0 {
            field.offset = Some(self.offset);
        }
        Ok(field)
    }
}

fn read_range_value<R: Read>(read: &mut R, data_type: DataType) -> Result<f64> {
    let value = match data_type {
        DataType::Bit | DataType::UnsignedChar => f64::from(read.read_u8()?),
        DataType::Char => f64::from(read.read_i8()?),
        DataType::UnsignedShort => f64::from(read.read_u16::<LittleEndian>()?),
        DataType::Short => f64::from(read.read_i16::<LittleEndian>()?),
        DataType::UnsignedLong => f64::from(read.read_u32::<LittleEndian>()?),
        DataType::Long => f64::from(read.read_i32::<LittleEndian>()?),
        DataType::UnsignedLongLong => read.read_u64::<LittleEndian>()? as f64,
        DataType::LongLong => read.read_i64::<LittleEndian>()? as f64,
        DataType::Float => f64::from(read.read_f32::<LittleEndian>()?),
        DataType::Double => read.read_f64::<LittleEndian>()?,
        DataType::Reserved | DataType::Unknown => {
            return Err(Error::InvalidFieldTable(format!(
                "field definition with unusable data type {data_type:?}"
            )))
        }
    };
    Ok(value)
}

fn write_range_value<W: Write>(write: &mut W, data_type: DataType, value: f64) -> Result<()> {
    match data_type {
        DataType::Bit | DataType::UnsignedChar => write.write_u8(value as u8)?,
        DataType::Char => write.write_i8(value as i8)?,
        DataType::UnsignedShort => write.write_u16::<LittleEndian>(value as u16)?,
        DataType::Short => write.write_i16::<LittleEndian>(value as i16)?,
        DataType::UnsignedLong => write.write_u32::<LittleEndian>(value as u32)?,
        DataType::Long => write.write_i32::<LittleEndian>(value as i32)?,
        DataType::UnsignedLongLong => write.write_u64::<LittleEndian>(value as u64)?,
        DataType::LongLong => write.write_i64::<LittleEndian>(value as i64)?,
        DataType::Float => write.write_f32::<LittleEndian>(value as f32)?,
        DataType::Double => write.write_f64::<LittleEndian>(value)?,
        DataType::Reserved | DataType::Unknown => {
            return Err(Error::InvalidFieldTable(format!(
                "field definition with unusable data type {data_type:?}"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PointFormat, Schema};

    #[test]
    fn serialized_sizes() {
        assert_eq!(91, FieldDefinition::serialized_size(DataType::Bit));
        assert_eq!(94, FieldDefinition::serialized_size(DataType::Short));
        assert_eq!(100, FieldDefinition::serialized_size(DataType::Float));
        assert_eq!(
            112,
            FieldDefinition::serialized_size(DataType::UnsignedLongLong)
        );
    }

    #[test]
    fn bytes_match_serialized_size() {
        let schema = Schema::new(PointFormat::new(8).unwrap());
        for field in schema.fields() {
            let definition = FieldDefinition::from_field(field);
            let mut bytes = Vec::new();
            definition.write_to(&mut bytes).unwrap();
            assert_eq!(
                FieldDefinition::serialized_size(field.data_type),
                bytes.len(),
                "{}",
                field.name
            );
        }
    }

    #[test]
    fn field_round_trip() {
        let schema = Schema::new(PointFormat::new(8).unwrap());
        for field in schema.fields() {
            let definition = FieldDefinition::from_field(field);
            let mut bytes = Vec::new();
            definition.write_to(&mut bytes).unwrap();
            let other = FieldDefinition::read_from(bytes.as_slice()).unwrap();
            assert_eq!(definition, other);
            let recovered = other.to_field(field.id).unwrap();
            assert_eq!(field.name, recovered.name);
            assert_eq!(field.data_type, recovered.data_type);
            assert_eq!(field.bit_size, recovered.bit_size);
            assert_eq!(field.scale, recovered.scale);
            assert_eq!(field.offset, recovered.offset);
        }
    }

    #[test]
    fn oversized_field_is_rejected() {
        let field = Field::new(FieldId::Unknown, "bad", DataType::UnsignedChar, 8).unwrap();
        let mut definition = FieldDefinition::from_field(&field);
        definition.size_in_bits = 16;
        let mut bytes = Vec::new();
        definition.write_to(&mut bytes).unwrap();
        let definition = FieldDefinition::read_from(bytes.as_slice()).unwrap();
        assert!(definition.to_field(FieldId::Unknown).is_err());
    }
}
