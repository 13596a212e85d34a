//! Crate-specific errors.

use crate::{field::DataType, FieldId, Transform, Version};
use thiserror::Error;

/// Crate-specific error enum.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A band was added with a data type that has no fixed numeric width.
    #[error("unsupported band data type: {0:?}")]
    InvalidBandDataType(DataType),

    /// A filter expression could not be parsed.
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),

    /// The file signature is not "HSPCD".
    #[error("invalid file signature: {0:?}")]
    InvalidFileSignature([u8; 5]),

    /// The field table read from a file is inconsistent.
    #[error("invalid field table: {0}")]
    InvalidFieldTable(String),

    /// A record failed a structural check, with the offending subsystem named.
    #[error("invalid point data ({0})")]
    InvalidPointData(String),

    /// The value can't have the inverse transform applied.
    #[error("the transform {transform} cannot be inversely applied to {n}")]
    InverseTransform {
        /// The offending value.
        n: f64,
        /// The transform that can't be applied.
        transform: Transform,
    },

    /// Wrapper around `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The requested feature was not compiled into this build.
    #[error("not supported by this configuration: {0}")]
    Configuration(&'static str),

    /// The point's schema has no field with this id.
    #[error("no field with id {0:?} on the schema")]
    MissingField(FieldId),

    /// The point's schema has no field at this sequence index.
    #[error("no field at index {0} on the schema")]
    MissingFieldIndex(usize),

    /// The operation is reserved for a later version.
    #[error("not yet implemented: {0}")]
    NotYetImplemented(&'static str),

    /// A point index is beyond the number of points in the file.
    #[error("point index {index} is beyond the point count {count}")]
    PointOutOfRange {
        /// The requested point index.
        index: u64,
        /// The number of points in the file.
        count: u64,
    },

    /// This string is too long for its fixed-width slot.
    #[error("string is too long for a slot of {len} bytes: {string}")]
    StringTooLong {
        /// The string.
        string: String,
        /// The slot length in bytes.
        len: usize,
    },

    /// The spatial index does not describe the current state of the file.
    #[error("the spatial index is stale and the file is read-only")]
    StaleIndex,

    /// Wrapper around `std::str::Utf8Error`.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    /// The version is not 1.0, the only version defined for HSPCD.
    #[error("unsupported version: {0}")]
    Version(Version),

    /// The writer is closed.
    #[error("the writer is closed")]
    ClosedWriter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_subsystem() {
        let error = Error::InvalidPointData("waveform".to_string());
        assert!(error.to_string().contains("waveform"));
    }
}
