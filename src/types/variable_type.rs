//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};

/// Value types published by the simulator.
/// Maps to the SDK's `irsdk_VarType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// 8-bit unsigned value (maps to irsdk_char)
    Byte,
    /// Boolean stored in one byte (maps to irsdk_bool)
    Bool,
    /// 32-bit signed integer (maps to irsdk_int)
    Int,
    /// 32-bit bit pattern (maps to irsdk_bitField)
    Bitfield,
    /// 32-bit IEEE float (maps to irsdk_float)
    Float,
    /// 64-bit IEEE float (maps to irsdk_double)
    Double,
}

impl VariableType {
    /// All value types in wire-code order.
    pub const ALL: [VariableType; 6] = [
        VariableType::Byte,
        VariableType::Bool,
        VariableType::Int,
        VariableType::Bitfield,
        VariableType::Float,
        VariableType::Double,
    ];

    /// Returns the size in bytes of one element of this type.
    /// Matches the irsdk_VarTypeBytes array from the SDK.
    pub const fn size(&self) -> usize {
        match self {
            VariableType::Byte | VariableType::Bool => 1,
            VariableType::Int | VariableType::Bitfield | VariableType::Float => 4,
            VariableType::Double => 8,
        }
    }

    /// Decode the wire type code. Unknown codes return `None`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(VariableType::Byte),
            1 => Some(VariableType::Bool),
            2 => Some(VariableType::Int),
            3 => Some(VariableType::Bitfield),
            4 => Some(VariableType::Float),
            5 => Some(VariableType::Double),
            _ => None,
        }
    }

    /// The wire type code for this value type.
    pub const fn code(&self) -> i32 {
        match self {
            VariableType::Byte => 0,
            VariableType::Bool => 1,
            VariableType::Int => 2,
            VariableType::Bitfield => 3,
            VariableType::Float => 4,
            VariableType::Double => 5,
        }
    }
}
