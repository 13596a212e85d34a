//! Spatial reference handling.
//!
//! The georeference of a file is an opaque WKT string stored verbatim in a
//! `.prj` companion next to the point file. No parsing or reprojection is
//! done here.

use crate::Result;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// An opaque spatial reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpatialReference {
    /// The WKT payload, stored and returned verbatim.
    pub wkt: String,
}

impl SpatialReference {
    /// Creates a spatial reference from a WKT string.
    pub fn from_wkt(wkt: &str) -> SpatialReference {
        SpatialReference {
            wkt: wkt.to_string(),
        }
    }

    /// Is there any georeference at all?
    pub fn is_empty(&self) -> bool {
        self.wkt.is_empty()
    }

    /// Reads the companion `.prj` of a point file, if present.
    pub fn from_companion<P: AsRef<Path>>(path: P) -> Result<Option<SpatialReference>> {
        let prj = companion_path(path.as_ref());
        if prj.exists() {
            let wkt = fs::read_to_string(prj)?;
            Ok(Some(SpatialReference { wkt }))
        } else {
            Ok(None)
        }
    }

    /// Writes the companion `.prj` of a point file.
    pub fn write_companion<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(companion_path(path.as_ref()), &self.wkt)?;
        Ok(())
    }
}

fn companion_path(path: &Path) -> PathBuf {
    path.with_extension("prj")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_swaps_extension() {
        assert_eq!(
            PathBuf::from("/data/cloud.prj"),
            companion_path(Path::new("/data/cloud.hsp"))
        );
    }

    #[test]
    fn round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("hspc-srs-test.hsp");
        let srs = SpatialReference::from_wkt("PROJCS[\"bogus\"]");
        srs.write_companion(&path).unwrap();
        let read = SpatialReference::from_companion(&path).unwrap().unwrap();
        assert_eq!(srs, read);
        let _ = std::fs::remove_file(companion_path(&path));
    }
}
