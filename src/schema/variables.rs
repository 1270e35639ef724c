//! Variable Record Parsing
//!
//! This module parses the simulator's `irsdk_varHeader` records. Each record describes
//! one variable published in every buffer slot.
//!
//! # Record Layout
//!
//! ```c
//! typedef struct irsdk_varHeader
//! {
//!     int type;                           // irsdk_VarType enum value
//!     int offset;                         // offset in bytes from buffer start
//!     int count;                          // number of elements (1 for scalar)
//!     bool countAsTime;                   // elements are time samples
//!     char pad[3];                        // padding for alignment
//!     char name[IRSDK_MAX_STRING];        // variable name (32 bytes)
//!     char desc[IRSDK_MAX_DESC];          // description (64 bytes)
//!     char unit[IRSDK_MAX_STRING];        // units (32 bytes)
//! } irsdk_varHeader;
//! ```
//!
//! Records are 144 bytes, little-endian, with NUL-terminated fixed-size strings.
//! Type codes outside 0..=5 are rejected rather than guessed.

use crate::error::HeaderViolation;
use crate::{VariableDescriptor, VariableType};
use tracing::trace;

/// Size of one variable record in bytes.
pub const VAR_HEADER_SIZE: usize = 144;
/// Size of the name and unit string fields.
pub const MAX_STRING: usize = 32;
/// Size of the description string field.
pub const MAX_DESC: usize = 64;

const TYPE_OFFSET: usize = 0;
const OFFSET_OFFSET: usize = 4;
const COUNT_OFFSET: usize = 8;
const COUNT_AS_TIME_OFFSET: usize = 12;
const NAME_OFFSET: usize = 16;
const DESC_OFFSET: usize = NAME_OFFSET + MAX_STRING;
const UNIT_OFFSET: usize = DESC_OFFSET + MAX_DESC;

/// One undecoded variable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VarRecord {
    pub type_code: i32,
    pub offset: i32,
    pub count: i32,
    pub count_as_time: u8,
    pub name: String,
    pub description: String,
    pub unit: String,
}

impl VarRecord {
    /// Decode a record from exactly [`VAR_HEADER_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= VAR_HEADER_SIZE);

        Self {
            type_code: i32_at(bytes, TYPE_OFFSET),
            offset: i32_at(bytes, OFFSET_OFFSET),
            count: i32_at(bytes, COUNT_OFFSET),
            count_as_time: bytes[COUNT_AS_TIME_OFFSET],
            name: c_string_to_string(&bytes[NAME_OFFSET..NAME_OFFSET + MAX_STRING]),
            description: c_string_to_string(&bytes[DESC_OFFSET..DESC_OFFSET + MAX_DESC]),
            unit: c_string_to_string(&bytes[UNIT_OFFSET..UNIT_OFFSET + MAX_STRING]),
        }
    }

    /// Validate the record against the buffer length and convert it.
    pub fn into_descriptor(
        self,
        index: usize,
        buffer_len: usize,
    ) -> Result<VariableDescriptor, HeaderViolation> {
        if self.name.is_empty() {
            return Err(HeaderViolation::EmptyName { index });
        }

        let value_type = VariableType::from_code(self.type_code).ok_or_else(|| {
            HeaderViolation::UnknownValueType { name: self.name.clone(), code: self.type_code }
        })?;

        if self.count <= 0 {
            return Err(HeaderViolation::NonPositiveCount { name: self.name, count: self.count });
        }

        if self.offset < 0 {
            return Err(HeaderViolation::NegativeField { field: "variable offset", value: self.offset });
        }

        if self.count_as_time > 1 {
            return Err(HeaderViolation::CountAsTimeFlag { name: self.name, flag: self.count_as_time });
        }

        let start = self.offset as usize;
        let end = (self.count as usize)
            .checked_mul(value_type.size())
            .and_then(|len| len.checked_add(start))
            .unwrap_or(usize::MAX);
        if end > buffer_len {
            return Err(HeaderViolation::VariableOutOfBounds {
                name: self.name,
                start,
                end,
                buffer_len,
            });
        }

        trace!(name = %self.name, ?value_type, start, end, "Decoded variable record");

        Ok(VariableDescriptor {
            name: self.name,
            value_type,
            value_count: self.count as usize,
            byte_offset: start,
            count_as_time: self.count_as_time != 0,
            description: self.description,
            unit: self.unit,
        })
    }
}

/// Read a little-endian i32 at `offset`. Callers have bounds-checked `bytes`.
pub(crate) fn i32_at(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(word)
}

/// Convert C string bytes to a Rust String, stopping at the first NUL.
pub(crate) fn c_string_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::encode_var_record;
    use proptest::prelude::*;

    fn record(name: &str, type_code: i32, offset: i32, count: i32) -> VarRecord {
        VarRecord::parse(&encode_var_record(name, type_code, offset, count, false, "desc", "m/s"))
    }

    #[test]
    fn c_string_conversion_works() {
        assert_eq!(c_string_to_string(b"RPM\0\0\0\0"), "RPM");
        assert_eq!(c_string_to_string(b"Speed"), "Speed");
        assert_eq!(c_string_to_string(b"\0\0\0\0"), "");
    }

    #[test]
    fn record_fields_decode_at_sdk_offsets() {
        let bytes = encode_var_record("LapDist", 4, 24, 1, true, "Meters traveled", "m");
        assert_eq!(bytes.len(), VAR_HEADER_SIZE);

        let parsed = VarRecord::parse(&bytes);
        assert_eq!(parsed.type_code, 4);
        assert_eq!(parsed.offset, 24);
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.count_as_time, 1);
        assert_eq!(parsed.name, "LapDist");
        assert_eq!(parsed.description, "Meters traveled");
        assert_eq!(parsed.unit, "m");
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = record("Foo", 2, 0, 0).into_descriptor(0, 64).unwrap_err();
        assert_eq!(err, HeaderViolation::NonPositiveCount { name: "Foo".into(), count: 0 });
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        let err = record("Foo", 9, 0, 1).into_descriptor(0, 64).unwrap_err();
        assert!(matches!(err, HeaderViolation::UnknownValueType { code: 9, .. }));
    }

    #[test]
    fn range_past_buffer_is_rejected() {
        let err = record("CarIdxRPM", 4, 8, 64).into_descriptor(0, 128).unwrap_err();
        assert!(matches!(err, HeaderViolation::VariableOutOfBounds { start: 8, end: 264, .. }));
    }

    #[test]
    fn empty_name_is_rejected_with_record_index() {
        let err = record("", 2, 0, 1).into_descriptor(7, 64).unwrap_err();
        assert_eq!(err, HeaderViolation::EmptyName { index: 7 });
    }

    #[test]
    fn count_as_time_must_be_a_bool() {
        let mut bytes = encode_var_record("SessionTime", 5, 0, 1, true, "", "s");
        bytes[COUNT_AS_TIME_OFFSET] = 2;
        let err = VarRecord::parse(&bytes).into_descriptor(0, 64).unwrap_err();
        assert_eq!(err, HeaderViolation::CountAsTimeFlag { name: "SessionTime".into(), flag: 2 });

        bytes[COUNT_AS_TIME_OFFSET] = 1;
        assert!(VarRecord::parse(&bytes).into_descriptor(0, 64).unwrap().count_as_time);
    }

    proptest! {
        #[test]
        fn prop_in_bounds_records_convert_exactly(
            type_code in 0..6i32,
            count in 1..64i32,
            offset in 0..512i32,
        ) {
            let value_type = VariableType::from_code(type_code).unwrap();
            let buffer_len = offset as usize + count as usize * value_type.size();

            let desc = record("Var", type_code, offset, count).into_descriptor(0, buffer_len).unwrap();
            prop_assert_eq!(desc.value_type, value_type);
            prop_assert_eq!(desc.byte_offset, offset as usize);
            prop_assert_eq!(desc.value_count, count as usize);
            prop_assert_eq!(desc.byte_range().end, buffer_len);
            prop_assert_eq!(desc.unit.as_str(), "m/s");
        }
    }
}
