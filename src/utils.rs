//! Private utility functions.

use crate::{Error, Result};
use std::io::{Read, Write};

/// Reads a fixed-width null-padded string slot.
///
/// Trailing nulls are unused bytes.
pub(crate) fn read_fixed_string<R: Read>(mut read: R, count: usize) -> Result<String> {
    let mut buffer = vec![0; count];
    read.read_exact(&mut buffer)?;
    let end = buffer
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(buffer.len());
    Ok(std::str::from_utf8(&buffer[..end])?.to_string())
}

/// Writes a string into a fixed-width null-padded slot.
pub(crate) fn write_fixed_string<W: Write>(mut write: W, s: &str, count: usize) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > count {
        return Err(Error::StringTooLong {
            string: s.to_string(),
            len: count,
        });
    }
    write.write_all(bytes)?;
    write.write_all(&vec![0; count - bytes.len()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buffer = Vec::new();
        write_fixed_string(&mut buffer, "Intensity", 32).unwrap();
        assert_eq!(32, buffer.len());
        assert_eq!(
            "Intensity",
            read_fixed_string(buffer.as_slice(), 32).unwrap()
        );
    }

    #[test]
    fn too_long() {
        let mut buffer = Vec::new();
        let long = "x".repeat(33);
        assert!(write_fixed_string(&mut buffer, &long, 32).is_err());
    }

    #[test]
    fn exactly_full() {
        let mut buffer = Vec::new();
        let s = "y".repeat(32);
        write_fixed_string(&mut buffer, &s, 32).unwrap();
        assert_eq!(s, read_fixed_string(buffer.as_slice(), 32).unwrap());
    }
}
