//! Raw, byte-exact file structures.
//!
//! These types mirror the on-disk layout of the HSPCD header section and
//! know how to read and write themselves with deterministic little-endian
//! byte order. The higher-level [Header](crate::Header) converts to and
//! from these structures.

mod field;
mod header;

pub use self::{
    field::FieldDefinition,
    header::{BlockDesc, FileHeader},
};

pub(crate) use self::header::{BLOCK_DESC_SIZE, FILE_HEADER_SIZE, POINT_COUNT_OFFSET};

/// The number of reserved bytes after the field definitions, before the
/// point records.
pub const RESERVED_BYTES_AFTER_FIELDS: usize = 128;
