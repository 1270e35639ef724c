//! BitField type for bitfield telemetry variables

use serde::{Deserialize, Serialize};

/// BitField type for 32-bit bit-pattern variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitField(pub u32);

impl BitField {
    /// Create a new BitField from a u32 value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u32) -> bool {
        bit < 32 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `flag` is set.
    pub fn has_flag(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }

    /// Get the raw u32 value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for BitField {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Compare tick counters with wraparound using the half-range rule.
/// Returns true if `a` is considered newer than `b`.
pub fn tick_after(a: i32, b: i32) -> bool {
    if a == b {
        return false;
    }
    (a as u32).wrapping_sub(b as u32) < 0x8000_0000
}
