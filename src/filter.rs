//! Filter and transform hooks for streaming reads.
//!
//! Readers and updaters carry two ordered chains: filters decide whether a
//! record is surfaced at all, transforms mutate records that pass. Only the
//! hook shapes are defined here; concrete filters live with their callers.
//!
//! ```
//! use hspc::{filter::PointFilter, Point};
//!
//! struct GroundOnly;
//!
//! impl PointFilter for GroundOnly {
//!     fn keep(&self, point: &Point) -> bool {
//!         point.z() < 1.0
//!     }
//! }
//! ```

use crate::Point;

/// A predicate applied to each record as it is read.
///
/// If any filter on a reader returns false the point is skipped and the
/// read advances until one passes or the file is exhausted.
pub trait PointFilter {
    /// Returns true if the point should be kept.
    fn keep(&self, point: &Point) -> bool;
}

/// A mutation applied to each record that passes the filters.
pub trait PointTransform {
    /// Transforms the point in place.
    fn transform(&self, point: &mut Point);

    /// Does this transform rebind points to a different header?
    ///
    /// When true, readers re-check the point's header binding before every
    /// subsequent read.
    fn modifies_header(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Above(f64);

    impl PointFilter for Above {
        fn keep(&self, point: &Point) -> bool {
            point.z() > self.0
        }
    }

    struct Lift(f64);

    impl PointTransform for Lift {
        fn transform(&self, point: &mut Point) {
            let z = point.z();
            let _ = point.set_z(z + self.0);
        }
    }

    #[test]
    fn keep_and_transform() {
        let mut point = Point::default();
        point.set_coordinates(0., 0., 2.).unwrap();
        assert!(Above(1.).keep(&point));
        assert!(!Above(3.).keep(&point));
        Lift(1.).transform(&mut point);
        assert!((point.z() - 3.).abs() < 1e-9);
        assert!(!Lift(0.).modifies_header());
    }
}
