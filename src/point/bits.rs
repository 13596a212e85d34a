//! Sub-byte bit field packing.
//!
//! Within one shared byte, later fields occupy higher bit positions: a
//! field of width `w` with schema bit offset `b` occupies bits
//! `b - w ..= b - 1` of its byte. Fields wider than a byte continue
//! MSB-ward through full bytes and end at bit `b` of the last byte. This
//! layout is a wire contract and must be preserved bit-for-bit.

use crate::Bitset;

/// Returns the `(first, last)` bit positions used in byte `i` of a field's
/// span.
pub(crate) fn bit_window(
    i: usize,
    byte_size: usize,
    bit_offset: usize,
    bit_size: usize,
) -> (usize, usize) {
    if i == 0 {
        let start = bit_offset.saturating_sub(bit_size % 8);
        let stop = if bit_size + start <= 8 {
            bit_size + start - 1
        } else {
            7
        };
        (start, stop)
    } else if i == byte_size - 1 {
        (0, bit_offset.min(7))
    } else {
        (0, 7)
    }
}

/// Reads a bit field from a record buffer.
pub(crate) fn read_bitfield(
    data: &[u8],
    byte_offset: usize,
    bit_offset: usize,
    bit_size: usize,
) -> Bitset {
    let byte_size = bit_size.div_ceil(8);
    let mut bitset = Bitset::new(bit_size);
    let mut current_bit = 0;
    for i in 0..byte_size {
        let (start, stop) = bit_window(i, byte_size, bit_offset, bit_size);
        let value = data[byte_offset + i];
        for j in start..=stop {
            if current_bit >= bit_size {
                break;
            }
            bitset.set(current_bit, (value >> j) & 1 == 1);
            current_bit += 1;
        }
    }
    bitset
}

/// Writes a bit field into a record buffer, leaving neighbouring bits of
/// shared bytes untouched.
pub(crate) fn write_bitfield(
    data: &mut [u8],
    byte_offset: usize,
    bit_offset: usize,
    bit_size: usize,
    bitset: &Bitset,
) {
    let byte_size = bit_size.div_ceil(8);
    let mut current_bit = 0;
    for i in 0..byte_size {
        let (start, stop) = bit_window(i, byte_size, bit_offset, bit_size);
        let mut mask = 0u8;
        let mut bits = 0u8;
        for j in start..=stop {
            if current_bit >= bit_size {
                break;
            }
            mask |= 1 << j;
            if bitset.get(current_bit) {
                bits |= 1 << j;
            }
            current_bit += 1;
        }
        let byte = &mut data[byte_offset + i];
        *byte = (*byte & !mask) | bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_byte_positions() {
        // 4-bit field at bit offset 4 occupies the low nibble.
        assert_eq!((0, 3), bit_window(0, 1, 4, 4));
        // 4-bit field at bit offset 8 occupies the high nibble.
        assert_eq!((4, 7), bit_window(0, 1, 8, 4));
        // 6 + 1 + 1 packing.
        assert_eq!((0, 5), bit_window(0, 1, 6, 6));
        assert_eq!((6, 6), bit_window(0, 1, 7, 1));
        assert_eq!((7, 7), bit_window(0, 1, 8, 1));
    }

    #[test]
    fn round_trip_all_asprs_pairs() {
        // every (width, bit offset) pair appearing in the basic skeleton
        for &(width, offset) in &[(4, 4), (4, 8), (6, 6), (1, 7), (1, 8)] {
            for value in 0..(1u64 << width) {
                let mut data = [0u8; 2];
                write_bitfield(&mut data, 0, offset, width, &Bitset::from_value(width, value));
                let read = read_bitfield(&data, 0, offset, width);
                assert_eq!(value, read.value(), "width {width} offset {offset}");
            }
        }
    }

    #[test]
    fn neighbours_are_untouched() {
        let mut data = [0u8; 1];
        write_bitfield(&mut data, 0, 4, 4, &Bitset::from_value(4, 0b1010));
        write_bitfield(&mut data, 0, 8, 4, &Bitset::from_value(4, 0b0101));
        assert_eq!(0b1010, read_bitfield(&data, 0, 4, 4).value());
        assert_eq!(0b0101, read_bitfield(&data, 0, 8, 4).value());
        // overwrite the first, second must survive
        write_bitfield(&mut data, 0, 4, 4, &Bitset::from_value(4, 0b1111));
        assert_eq!(0b0101, read_bitfield(&data, 0, 8, 4).value());
    }

    #[test]
    fn multi_byte_field() {
        let mut data = [0u8; 3];
        let value = 0b1010_1100_0110u64; // 12 bits
        write_bitfield(&mut data, 0, 4, 12, &Bitset::from_value(12, value));
        assert_eq!(value, read_bitfield(&data, 0, 4, 12).value());
    }
}
