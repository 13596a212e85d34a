//! The fixed file header and the block descriptor.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The file signature at the start of every HSPCD file.
pub(crate) const FILE_SIGNATURE: [u8; 5] = *b"HSPCD";

/// The serialized size of a [FileHeader], including the trailing return
/// count.
pub(crate) const FILE_HEADER_SIZE: usize = 108;

/// The serialized size of a [BlockDesc].
pub(crate) const BLOCK_DESC_SIZE: usize = 48;

/// The byte position of the point record count inside the file header.
pub(crate) const POINT_COUNT_OFFSET: u64 = 8;

const BAND_DATA_INTERNAL_BIT: u8 = 0x01;
const WAVEFORM_DATA_INTERNAL_BIT: u8 = 0x02;

/// The fixed leading portion of an HSPCD file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FileHeader {
    /// The file signature, always `HSPCD`.
    pub file_signature: [u8; 5],
    /// The major version, always 1.
    pub major_version: u8,
    /// The minor version, always 0.
    pub minor_version: u8,
    /// The byte order marker.
    pub byte_order: u8,
    /// The total number of point records.
    pub number_of_point_records: u64,
    /// The byte position where the point records begin.
    pub point_data_offset: u64,
    /// Minimum X extent.
    pub x_min: f64,
    /// Maximum X extent.
    pub x_max: f64,
    /// Minimum Y extent.
    pub y_min: f64,
    /// Maximum Y extent.
    pub y_max: f64,
    /// Minimum Z extent.
    pub z_min: f64,
    /// Maximum Z extent.
    pub z_max: f64,
    /// The number of returns recorded per pulse.
    pub number_of_returns: u32,
}

impl FileHeader {
    /// Reads a file header, validating the signature and version.
    pub fn read_from<R: Read>(mut read: R) -> Result<FileHeader> {
        let mut file_signature = [0; 5];
        read.read_exact(&mut file_signature)?;
        if file_signature != FILE_SIGNATURE {
            return Err(Error::InvalidFileSignature(file_signature));
        }
        let major_version = read.read_u8()?;
        let minor_version = read.read_u8()?;
        let byte_order = read.read_u8()?;
        let number_of_point_records = read.read_u64::<LittleEndian>()?;
        let point_data_offset = read.read_u64::<LittleEndian>()?;
        let x_min = read.read_f64::<LittleEndian>()?;
        let x_max = read.read_f64::<LittleEndian>()?;
        let y_min = read.read_f64::<LittleEndian>()?;
        let y_max = read.read_f64::<LittleEndian>()?;
        let z_min = read.read_f64::<LittleEndian>()?;
        let z_max = read.read_f64::<LittleEndian>()?;
        let mut reserved = [0; 32];
        read.read_exact(&mut reserved)?;
        let number_of_returns = read.read_u32::<LittleEndian>()?;
        Ok(FileHeader {
            file_signature,
            major_version,
            minor_version,
            byte_order,
            number_of_point_records,
            point_data_offset,
            x_min,
            x_max,
            y_min,
            y_max,
            z_min,
            z_max,
            number_of_returns,
        })
    }

    /// Writes this file header.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_all(&self.file_signature)?;
        write.write_u8(self.major_version)?;
        write.write_u8(self.minor_version)?;
        write.write_u8(self.byte_order)?;
        write.write_u64::<LittleEndian>(self.number_of_point_records)?;
        write.write_u64::<LittleEndian>(self.point_data_offset)?;
        write.write_f64::<LittleEndian>(self.x_min)?;
        write.write_f64::<LittleEndian>(self.x_max)?;
        write.write_f64::<LittleEndian>(self.y_min)?;
        write.write_f64::<LittleEndian>(self.y_max)?;
        write.write_f64::<LittleEndian>(self.z_min)?;
        write.write_f64::<LittleEndian>(self.z_max)?;
        write.write_all(&[0; 32])?;
        write.write_u32::<LittleEndian>(self.number_of_returns)?;
        Ok(())
    }
}

impl Default for FileHeader {
    fn default() -> FileHeader {
        FileHeader {
            file_signature: FILE_SIGNATURE,
            major_version: 1,
            minor_version: 0,
            byte_order: 0,
            number_of_point_records: 0,
            point_data_offset: 0,
            x_min: 0.,
            x_max: 0.,
            y_min: 0.,
            y_max: 0.,
            z_min: 0.,
            z_max: 0.,
            number_of_returns: 0,
        }
    }
}

/// The descriptor of the field definition block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockDesc {
    /// The number of field definitions.
    pub field_count: u32,
    /// The encoding of the field definitions.
    pub field_def_encoding: u32,
    /// The character encoding of field names, as an ANSI code page.
    pub character_encoding: u16,
    /// The number of waveform packet descriptors.
    pub number_of_waveform_packet_desc: u16,
    /// Is band data stored inline in this file?
    pub band_data_internal: bool,
    /// Is waveform data stored inline in this file?
    pub waveform_data_internal: bool,
}

impl BlockDesc {
    /// Reads a block descriptor.
    pub fn read_from<R: Read>(mut read: R) -> Result<BlockDesc> {
        let field_count = read.read_u32::<LittleEndian>()?;
        let field_def_encoding = read.read_u32::<LittleEndian>()?;
        let character_encoding = read.read_u16::<LittleEndian>()?;
        let number_of_waveform_packet_desc = read.read_u16::<LittleEndian>()?;
        let options = read.read_u8()?;
        let mut reserved = [0; 35];
        read.read_exact(&mut reserved)?;
        Ok(BlockDesc {
            field_count,
            field_def_encoding,
            character_encoding,
            number_of_waveform_packet_desc,
            band_data_internal: options & BAND_DATA_INTERNAL_BIT != 0,
            waveform_data_internal: options & WAVEFORM_DATA_INTERNAL_BIT != 0,
        })
    }

    /// Writes this block descriptor.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u32::<LittleEndian>(self.field_count)?;
        write.write_u32::<LittleEndian>(self.field_def_encoding)?;
        write.write_u16::<LittleEndian>(self.character_encoding)?;
        write.write_u16::<LittleEndian>(self.number_of_waveform_packet_desc)?;
        let mut options = 0;
        if self.band_data_internal {
            options |= BAND_DATA_INTERNAL_BIT;
        }
        if self.waveform_data_internal {
            options |= WAVEFORM_DATA_INTERNAL_BIT;
        }
        write.write_u8(options)?;
        write.write_all(&[0; 35])?;
        Ok(())
    }
}

impl Default for BlockDesc {
    fn default() -> BlockDesc {
        BlockDesc {
            field_count: 0,
            field_def_encoding: 0,
            character_encoding: 0,
            number_of_waveform_packet_desc: 0,
            band_data_internal: true,
            waveform_data_internal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_round_trip() {
        let header = FileHeader {
            number_of_point_records: 42,
            point_data_offset: 1234,
            x_min: -1.,
            x_max: 1.,
            number_of_returns: 5,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(FILE_HEADER_SIZE, bytes.len());
        let other = FileHeader::read_from(bytes.as_slice()).unwrap();
        assert_eq!(header, other);
    }

    #[test]
    fn bad_signature() {
        let mut bytes = Vec::new();
        FileHeader::default().write_to(&mut bytes).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            FileHeader::read_from(bytes.as_slice()),
            Err(Error::InvalidFileSignature(_))
        ));
    }

    #[test]
    fn block_desc_round_trip() {
        let block = BlockDesc {
            field_count: 13,
            number_of_waveform_packet_desc: 2,
            band_data_internal: true,
            waveform_data_internal: false,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        block.write_to(&mut bytes).unwrap();
        assert_eq!(BLOCK_DESC_SIZE, bytes.len());
        let other = BlockDesc::read_from(bytes.as_slice()).unwrap();
        assert_eq!(block, other);
    }

    #[test]
    fn point_count_sits_after_version_bytes() {
        let header = FileHeader {
            number_of_point_records: 0x0102030405060708,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(0x08, bytes[POINT_COUNT_OFFSET as usize]);
    }
}
