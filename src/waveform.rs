//! Waveform descriptors, per-point packet definitions, and payload assembly.
//!
//! A file-level [WaveformPacketDesc] describes how a digitizer sampled the
//! returned signal. Each point that carries waveform data stores a payload
//! that starts with a band count, followed by one
//! [WaveformPacketDataDefinition] per band, followed by the concatenated
//! raw packets. [WaveformPacketRecord] assembles such a payload in memory:
//!
//! ```
//! use hspc::waveform::{WaveformPacketDataDefinition, WaveformPacketRecord};
//!
//! let mut record = WaveformPacketRecord::default();
//! let definition = WaveformPacketDataDefinition { band_index: 0, ..Default::default() };
//! record.add_raw_packet(definition, vec![23; 128]);
//! let data = record.to_waveform_data();
//! assert_eq!(2 + 28 + 128, data.len());
//! ```

use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The serialized size of a [WaveformPacketDesc].
pub const WAVEFORM_PACKET_DESC_SIZE: usize = 32;

/// The serialized size of a [WaveformPacketDataDefinition].
pub const WAVEFORM_PACKET_DATA_DEFINITION_SIZE: usize = 28;

/// File-level metadata for one class of waveform packets.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WaveformPacketDesc {
    /// The descriptor id.
    pub id: u16,
    /// Bits per sample.
    pub sample_bits: u8,
    /// Compression type, zero for none.
    pub compress_type: u8,
    /// Number of samples.
    pub samples: u32,
    /// Sample interval in picoseconds.
    pub interval: u32,
    /// Digitizer gain.
    pub gain: f64,
    /// Digitizer offset.
    pub offset: f64,
}

impl WaveformPacketDesc {
    /// Creates a new descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use hspc::waveform::WaveformPacketDesc;
    /// let desc = WaveformPacketDesc::new(0, 8, 0, 128, 10, 1., 0.);
    /// assert_eq!(128, desc.samples);
    /// ```
    pub fn new(
        id: u16,
        sample_bits: u8,
        compress_type: u8,
        samples: u32,
        interval: u32,
        gain: f64,
        offset: f64,
    ) -> WaveformPacketDesc {
        WaveformPacketDesc {
            id,
            sample_bits,
            compress_type,
            samples,
            interval,
            gain,
            offset,
        }
    }

    /// Reads a descriptor.
    pub fn read_from<R: Read>(mut read: R) -> Result<WaveformPacketDesc> {
        let id = read.read_u16::<LittleEndian>()?;
        let mut reserved = [0; 4];
        read.read_exact(&mut reserved)?;
        let sample_bits = read.read_u8()?;
        let compress_type = read.read_u8()?;
        let samples = read.read_u32::<LittleEndian>()?;
        let interval = read.read_u32::<LittleEndian>()?;
        let gain = read.read_f64::<LittleEndian>()?;
        let offset = read.read_f64::<LittleEndian>()?;
        Ok(WaveformPacketDesc {
            id,
            sample_bits,
            compress_type,
            samples,
            interval,
            gain,
            offset,
        })
    }

    /// Writes this descriptor.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.id)?;
        write.write_all(&[0; 4])?;
        write.write_u8(self.sample_bits)?;
        write.write_u8(self.compress_type)?;
        write.write_u32::<LittleEndian>(self.samples)?;
        write.write_u32::<LittleEndian>(self.interval)?;
        write.write_f64::<LittleEndian>(self.gain)?;
        write.write_f64::<LittleEndian>(self.offset)?;
        Ok(())
    }
}

/// The per-point, per-band locator for one waveform packet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WaveformPacketDataDefinition {
    /// The spectral band this packet belongs to.
    pub band_index: u16,
    /// The [WaveformPacketDesc] describing this packet.
    pub descriptor_index: u16,
    /// Temporal offset to the anchor point, in picoseconds.
    pub temporal_offset: f32,
    /// X component of the anchor vector.
    pub dx: f32,
    /// Y component of the anchor vector.
    pub dy: f32,
    /// Z component of the anchor vector.
    pub dz: f32,
    /// Byte offset of this packet within the point's waveform payload.
    pub byte_offset: u32,
    /// Byte size of this packet.
    pub size: u32,
}

impl WaveformPacketDataDefinition {
    /// Reads a definition.
    pub fn read_from<R: Read>(mut read: R) -> Result<WaveformPacketDataDefinition> {
        Ok(WaveformPacketDataDefinition {
            band_index: read.read_u16::<LittleEndian>()?,
            descriptor_index: read.read_u16::<LittleEndian>()?,
            temporal_offset: read.read_f32::<LittleEndian>()?,
            dx: read.read_f32::<LittleEndian>()?,
            dy: read.read_f32::<LittleEndian>()?,
            dz: read.read_f32::<LittleEndian>()?,
            byte_offset: read.read_u32::<LittleEndian>()?,
            size: read.read_u32::<LittleEndian>()?,
        })
    }

    /// Writes this definition.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.band_index)?;
        write.write_u16::<LittleEndian>(self.descriptor_index)?;
        write.write_f32::<LittleEndian>(self.temporal_offset)?;
        write.write_f32::<LittleEndian>(self.dx)?;
        write.write_f32::<LittleEndian>(self.dy)?;
        write.write_f32::<LittleEndian>(self.dz)?;
        write.write_u32::<LittleEndian>(self.byte_offset)?;
        write.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }
}

/// In-memory assembly of one point's multi-band waveform payload.
#[derive(Clone, Debug, Default)]
pub struct WaveformPacketRecord {
    definitions: Vec<WaveformPacketDataDefinition>,
    packets: Vec<Vec<u8>>,
}

impl WaveformPacketRecord {
    /// Appends one (definition, raw packet) pair.
    ///
    /// Every entry's byte offset is recomputed so offsets stay consistent
    /// as packets are added, and the definition's size is set from the
    /// packet.
    pub fn add_raw_packet(&mut self, definition: WaveformPacketDataDefinition, packet: Vec<u8>) {
        let mut definition = definition;
        definition.size = packet.len() as u32;
        self.definitions.push(definition);
        self.packets.push(packet);
        self.update_byte_offsets();
    }

    /// Returns the definitions, in order.
    pub fn definitions(&self) -> &[WaveformPacketDataDefinition] {
        &self.definitions
    }

    /// Returns the raw packets, in order.
    pub fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    /// Emits the payload: band count, definitions, then packet bytes.
    pub fn to_waveform_data(&self) -> Vec<u8> {
        let payload: usize = self.packets.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(
            2 + self.definitions.len() * WAVEFORM_PACKET_DATA_DEFINITION_SIZE + payload,
        );
        data.write_u16::<LittleEndian>(self.definitions.len() as u16)
            .expect("writing to a vec cannot fail");
        for definition in &self.definitions {
            definition
                .write_to(&mut data)
                .expect("writing to a vec cannot fail");
        }
        for packet in &self.packets {
            data.extend_from_slice(packet);
        }
        data
    }

    /// Parses a payload produced by [to_waveform_data](Self::to_waveform_data).
    pub fn parse(data: &[u8]) -> Result<WaveformPacketRecord> {
        let mut cursor = std::io::Cursor::new(data);
        let count = cursor.read_u16::<LittleEndian>()?;
        let mut definitions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            definitions.push(WaveformPacketDataDefinition::read_from(&mut cursor)?);
        }
        let mut packets = Vec::with_capacity(count as usize);
        for definition in &definitions {
            let start = definition.byte_offset as usize;
            let end = start + definition.size as usize;
            if end > data.len() {
                return Err(crate::Error::InvalidPointData(format!(
                    "waveform packet for band {} is out of bounds",
                    definition.band_index
                )));
            }
            packets.push(data[start..end].to_vec());
        }
        Ok(WaveformPacketRecord {
            definitions,
            packets,
        })
    }

    fn update_byte_offsets(&mut self) {
        let header = 2 + self.definitions.len() * WAVEFORM_PACKET_DATA_DEFINITION_SIZE;
        let mut data_bytes = 0;
        for (definition, packet) in self.definitions.iter_mut().zip(&self.packets) {
            definition.byte_offset = (header + data_bytes) as u32;
            data_bytes += packet.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desc_round_trip() {
        let desc = WaveformPacketDesc::new(1, 8, 0, 128, 10, 2., -1.);
        let mut bytes = Vec::new();
        desc.write_to(&mut bytes).unwrap();
        assert_eq!(WAVEFORM_PACKET_DESC_SIZE, bytes.len());
        let other = WaveformPacketDesc::read_from(bytes.as_slice()).unwrap();
        assert_eq!(desc, other);
    }

    #[test]
    fn definition_round_trip() {
        let definition = WaveformPacketDataDefinition {
            band_index: 3,
            descriptor_index: 0,
            temporal_offset: 1234.,
            dx: 0.1,
            dy: 0.2,
            dz: 0.3,
            byte_offset: 30,
            size: 128,
        };
        let mut bytes = Vec::new();
        definition.write_to(&mut bytes).unwrap();
        assert_eq!(WAVEFORM_PACKET_DATA_DEFINITION_SIZE, bytes.len());
        let other = WaveformPacketDataDefinition::read_from(bytes.as_slice()).unwrap();
        assert_eq!(definition, other);
    }

    #[test]
    fn record_offsets() {
        let mut record = WaveformPacketRecord::default();
        record.add_raw_packet(Default::default(), vec![1; 10]);
        record.add_raw_packet(Default::default(), vec![2; 20]);
        let header = 2 + 2 * WAVEFORM_PACKET_DATA_DEFINITION_SIZE;
        assert_eq!(header as u32, record.definitions()[0].byte_offset);
        assert_eq!((header + 10) as u32, record.definitions()[1].byte_offset);
        assert_eq!(10, record.definitions()[0].size);
        assert_eq!(20, record.definitions()[1].size);
    }

    #[test]
    fn record_round_trip() {
        let mut record = WaveformPacketRecord::default();
        record.add_raw_packet(
            WaveformPacketDataDefinition {
                band_index: 0,
                ..Default::default()
            },
            vec![23; 128],
        );
        record.add_raw_packet(
            WaveformPacketDataDefinition {
                band_index: 1,
                ..Default::default()
            },
            vec![42; 64],
        );
        let data = record.to_waveform_data();
        let other = WaveformPacketRecord::parse(&data).unwrap();
        assert_eq!(record.definitions(), other.definitions());
        assert_eq!(record.packets(), other.packets());
    }
}
