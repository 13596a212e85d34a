//! Scale and offset transforms between raw integer storage and coordinates.

use crate::{Error, Result};
use std::fmt;

/// A scale and an offset that transforms raw values to coordinates.
///
/// The logical value of a stored raw value `r` is `r * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// The scale.
    pub scale: f64,
    /// The offset.
    pub offset: f64,
}

impl Transform {
    /// Applies this transform to a raw i32, returning a float.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hspc::Transform;
    /// let transform = Transform { scale: 2., offset: 1. };
    /// assert_eq!(3., transform.direct(1));
    /// ```
    pub fn direct(&self, n: i32) -> f64 {
        self.scale * f64::from(n) + self.offset
    }

    /// Applies the inverse transform, rounding half away from zero.
    ///
    /// Returns an error if the resultant value can't be represented as an i32.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hspc::Transform;
    /// let transform = Transform { scale: 2., offset: 1. };
    /// assert_eq!(1, transform.inverse(2.9).unwrap());
    /// ```
    pub fn inverse(&self, n: f64) -> Result<i32> {
        let raw = sround((n - self.offset) / self.scale);
        if raw > f64::from(i32::MAX) || raw < f64::from(i32::MIN) {
            Err(Error::InverseTransform {
                n,
                transform: *self,
            })
        } else {
            Ok(raw as i32)
        }
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            scale: 1.,
            offset: 0.,
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{} * x + {}`", self.scale, self.offset)
    }
}

/// Rounds half away from zero.
///
/// This is the rounding used everywhere a logical value is converted back to
/// raw integer storage, for both coordinates and scaled fields.
pub(crate) fn sround(n: f64) -> f64 {
    if n >= 0. {
        (n + 0.5).floor()
    } else {
        (n - 0.5).ceil()
    }
}
