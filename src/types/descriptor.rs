//! Telemetry variable descriptors

use serde::{Deserialize, Serialize};

use super::VariableType;

/// Immutable description of one published variable.
///
/// Produced by [`ConnectionHeader::parse`](crate::schema::ConnectionHeader::parse) and
/// valid for the lifetime of the connection that parsed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Variable name as published by the simulator (case-sensitive, unique)
    pub name: String,
    /// Value type of each element
    pub value_type: VariableType,
    /// Number of elements (1 for scalars)
    pub value_count: usize,
    /// Byte offset of the first element within a snapshot
    pub byte_offset: usize,
    /// Whether the simulator treats the element count as elapsed time samples
    pub count_as_time: bool,
    /// Human-readable description
    pub description: String,
    /// Units of measurement, empty when unitless
    pub unit: String,
}

impl VariableDescriptor {
    /// Whether the variable publishes more than one element.
    pub fn is_array(&self) -> bool {
        self.value_count > 1
    }

    /// Total bytes occupied by all elements.
    pub fn byte_len(&self) -> usize {
        self.value_type.size() * self.value_count
    }

    /// Byte range occupied within a snapshot.
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.byte_offset..self.byte_offset + self.byte_len()
    }
}

/// A variable that has been confirmed present and addressable.
///
/// Created the first time a registered name is found in a connection header, see
/// [`VariableRegistry`](crate::registry::VariableRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub descriptor: VariableDescriptor,
    /// Tick of the snapshot current when the variable was activated
    pub activated_at_tick: i32,
}
