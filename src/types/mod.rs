//! Core types for telemetry data representation.
//!
//! This module provides the data structures that sit above the header trust boundary:
//!
//! - [`VariableType`] maps to the SDK's `irsdk_VarType` enum with size information
//! - [`VariableDescriptor`] describes where and how a variable is stored in a snapshot
//! - [`SnapshotCopy`] is a consistent, caller-owned copy of one buffer slot
//! - [`VarData`] and [`Variable`] provide type-checked reads from snapshot bytes
//! - [`BitField`] handles bitfield variables with flag operations
//!
//! ## Usage Example
//!
//! ```rust
//! use pitlane::types::{SnapshotCopy, VariableDescriptor, VariableType};
//!
//! let rpm = VariableDescriptor {
//!     name: "RPM".to_string(),
//!     value_type: VariableType::Float,
//!     value_count: 1,
//!     byte_offset: 0,
//!     count_as_time: false,
//!     description: "Engine RPM".to_string(),
//!     unit: "revs/min".to_string(),
//! };
//!
//! let snapshot = SnapshotCopy::new(4500.0f32.to_le_bytes().to_vec(), 2, 0);
//! let value: f32 = snapshot.read(&rpm).unwrap();
//! assert_eq!(value, 4500.0);
//! ```

mod bitfield;
mod descriptor;
mod snapshot;
mod var_data;
mod variable_type;

pub use bitfield::{BitField, tick_after};
pub use descriptor::{VariableDescriptor, VariableInfo};
pub use snapshot::SnapshotCopy;
pub use var_data::{VarData, Variable, is_compatible, read, read_array, read_index};
pub use variable_type::VariableType;
