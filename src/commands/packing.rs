//! Fixed-point argument packing
//!
//! Fractional command arguments travel as `round(value * SCALE_FACTOR)` in a 32-bit
//! slot. Unpacking divides by the same constant and is exact, so a value survives a
//! round trip only to within `1 / SCALE_FACTOR`. Compare packed values through
//! [`normalize`] rather than against raw floats.

use thiserror::Error;

/// Scale applied to fractional arguments (16.16 fixed point).
pub const SCALE_FACTOR: f64 = 65536.0;

/// Why a value could not be packed.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PackError {
    #[error("{value} is not finite")]
    NonFinite { value: f64 },

    #[error("{value} packs to {scaled}, outside the 32-bit range")]
    OutOfRange { value: f64, scaled: f64 },
}

/// Pack `value` into 16.16 fixed point, rounding half away from zero.
pub fn pack(value: f64) -> Result<i32, PackError> {
    if !value.is_finite() {
        return Err(PackError::NonFinite { value });
    }
    let scaled = (value * SCALE_FACTOR).round();
    if scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(PackError::OutOfRange { value, scaled });
    }
    Ok(scaled as i32)
}

/// Unpack a 16.16 fixed-point value. Exact.
pub fn unpack(packed: i32) -> f64 {
    f64::from(packed) / SCALE_FACTOR
}

/// The value `value` becomes after a pack/unpack round trip.
pub fn normalize(value: f64) -> Result<f64, PackError> {
    pack(value).map(unpack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Largest magnitude that still packs.
    const LIMIT: f64 = 32767.0;

    proptest! {
        #[test]
        fn prop_round_trip_within_one_step(value in -LIMIT..LIMIT) {
            let back = unpack(pack(value).unwrap());
            prop_assert!((back - value).abs() <= 1.0 / SCALE_FACTOR);
        }

        #[test]
        fn prop_normalize_is_idempotent(value in -LIMIT..LIMIT) {
            let once = normalize(value).unwrap();
            prop_assert_eq!(normalize(once).unwrap(), once);
        }

        #[test]
        fn prop_unpack_then_pack_is_identity(packed in any::<i32>()) {
            prop_assert_eq!(pack(unpack(packed)).unwrap(), packed);
        }

        #[test]
        fn prop_values_beyond_range_are_rejected(value in 32768.0f64..1e12) {
            let positive = matches!(pack(value), Err(PackError::OutOfRange { .. }));
            let negative = matches!(pack(-value - 1.0), Err(PackError::OutOfRange { .. }));
            prop_assert!(positive);
            prop_assert!(negative);
        }
    }

    #[test]
    fn documented_examples() {
        assert_eq!(pack(32.0).unwrap(), 2_097_152);
        assert_eq!(unpack(2_097_152), 32.0);

        let near = 32.00001;
        assert!((unpack(pack(near).unwrap()) - near).abs() < 1.0 / SCALE_FACTOR);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let half_step = 0.5 / SCALE_FACTOR;
        assert_eq!(pack(half_step).unwrap(), 1);
        assert_eq!(pack(-half_step).unwrap(), -1);
    }

    #[test]
    fn range_edges() {
        assert_eq!(pack(unpack(i32::MAX)).unwrap(), i32::MAX);
        assert_eq!(pack(-32768.0).unwrap(), i32::MIN);
        assert!(matches!(pack(32768.0), Err(PackError::OutOfRange { .. })));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(pack(value), Err(PackError::NonFinite { .. })));
        }
    }
}
