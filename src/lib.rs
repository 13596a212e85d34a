//! Read, write, update and spatially index HSPCD hyperspectral point
//! cloud data.
//!
//! HSPCD files carry a self-describing schema: the header enumerates every
//! field of the fixed-size point records, including an arbitrary number of
//! per-point spectral band values and optional per-point waveform payloads.
//!
//! # Reading
//!
//! Create a [Reader] from a path, or from anything that implements `Read`
//! and `Seek`:
//!
//! ```no_run
//! use hspc::Reader;
//! let mut reader = Reader::from_path("cloud.hsp").unwrap();
//! while reader.read_next_point(false).unwrap() {
//!     let point = reader.point();
//!     println!("({}, {}, {})", point.x(), point.y(), point.z());
//! }
//! ```
//!
//! # Writing
//!
//! Configure a [Header] (point format, spectral bands, waveform
//! descriptors), then stream [Point]s through a [Writer]:
//!
//! ```
//! use hspc::{field::DataType, schema::BandDesc, Header, Point, PointFormat, Writer};
//! use std::io::Cursor;
//!
//! let mut header = Header::new(PointFormat::new(2).unwrap());
//! header
//!     .schema_mut()
//!     .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 32)
//!     .unwrap();
//!
//! let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
//! let mut point = Point::new(writer.header().clone().into());
//! point.set_coordinates(1., 2., 3.).unwrap();
//! writer.write_point(&mut point).unwrap();
//! ```
//!
//! # Updating
//!
//! An [Updater] rewrites field values in place through a read-write handle.
//!
//! # Spatial queries
//!
//! A [SpatialIndex](index::SpatialIndex) buckets point ids into a grid with
//! an external-memory sort and answers box queries without scanning the
//! whole file.

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_qualifications
)]

pub mod field;
pub mod filter;
pub mod index;
pub mod point;
pub mod raw;
pub mod schema;
pub mod srs;
pub mod waveform;

mod bounds;
mod error;
mod header;
mod reader;
mod transform;
mod updater;
mod utils;
mod variant;
mod vector;
mod version;
mod writer;

pub use crate::{
    bounds::Bounds,
    error::Error,
    field::{Field, FieldId},
    header::{default_header, Header},
    point::Point,
    reader::Reader,
    schema::{PointFormat, Schema},
    srs::SpatialReference,
    transform::Transform,
    updater::Updater,
    variant::{Bitset, FromVariant, Variant},
    vector::Vector,
    version::Version,
    writer::Writer,
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
