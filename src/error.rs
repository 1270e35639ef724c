//! Error types for telemetry and command processing.
//!
//! This module provides the single error type used across the pitlane library.
//! All errors implement the `std::error::Error` trait and carry structured context
//! for diagnostics and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Header Errors**: the shared memory header failed validation (`MalformedHeader`,
//!   `UnsupportedVersion`). These are fatal to the connection.
//! - **Snapshot Errors**: a consistent snapshot could not be acquired in time
//!   (`ReadTimeout`, `InconsistentSnapshot`). These are recoverable; retry the read.
//! - **Typed Access Errors**: a descriptor was paired with the wrong representation or
//!   index (`TypeMismatch`, `IndexOutOfRange`, `OutOfBounds`).
//! - **Command Errors**: an argument does not fit its wire slot (`ArgumentOutOfRange`) or
//!   delivery failed (`Dispatch`).
//! - **Platform Errors**: connection and Windows API failures.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use pitlane::TelemetryError;
//! use std::time::Duration;
//!
//! let error = TelemetryError::ReadTimeout { duration: Duration::from_millis(250) };
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::commands::CommandId;
use crate::types::VariableType;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for pitlane operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry and command operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Malformed shared memory header: {violation}")]
    MalformedHeader { violation: HeaderViolation },

    #[error("Unsupported header version {found} (supported {min_supported}..={max_supported})")]
    UnsupportedVersion { found: i32, min_supported: i32, max_supported: i32 },

    #[error("Timed out after {duration:?} waiting for a telemetry update")]
    ReadTimeout { duration: Duration },

    #[error("No consistent snapshot after {attempts} attempts")]
    InconsistentSnapshot { attempts: u32 },

    #[error("Variable '{variable}' has type {actual:?}, cannot be read as {requested}")]
    TypeMismatch { variable: String, actual: VariableType, requested: &'static str },

    #[error("Index {index} out of range for variable '{variable}' with {count} elements")]
    IndexOutOfRange { variable: String, index: usize, count: usize },

    #[error("Read of {len} bytes at offset {offset:#x} exceeds snapshot of {available} bytes")]
    OutOfBounds { offset: usize, len: usize, available: usize },

    #[error("Variable '{name}' not found in telemetry header")]
    VariableNotFound { name: String },

    #[error("Argument {slot} of command {command} out of range: {violation}")]
    ArgumentOutOfRange { command: CommandId, slot: u8, violation: RangeViolation },

    #[error("Command dispatch failed: {reason}")]
    Dispatch {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to connect to simulator: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

/// The specific header invariant that failed validation.
///
/// Carried by [`TelemetryError::MalformedHeader`] so that a failed connection attempt
/// names exactly what the simulator published wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderViolation {
    #[error("region of {len} bytes is smaller than the {required}-byte fixed header")]
    TooShort { len: usize, required: usize },

    #[error("fixed header is all zeros (simulator has not initialised the region)")]
    Uninitialized,

    #[error("field {field} is negative ({value})")]
    NegativeField { field: &'static str, value: i32 },

    #[error("buffer count {count} outside 1..={max}")]
    BufferCount { count: i32, max: usize },

    #[error("buffer length must be positive, found {len}")]
    BufferLength { len: i32 },

    #[error("buffer {slot} range {start}..{end} exceeds region of {region_len} bytes")]
    BufferOutOfBounds { slot: usize, start: usize, end: usize, region_len: usize },

    #[error("buffer {slot} overlaps {other}")]
    BufferOverlap { slot: usize, other: String },

    #[error("variable table {start}..{end} is not between the fixed header and the end of the {region_len}-byte region")]
    VariableTableOutOfBounds { start: usize, end: usize, region_len: usize },

    #[error("session info {start}..{end} is outside the region of {region_len} bytes")]
    SessionInfoOutOfBounds { start: usize, end: usize, region_len: usize },

    #[error("variable #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("variable name '{name}' appears more than once")]
    DuplicateName { name: String },

    #[error("variable '{name}' has unknown type code {code}")]
    UnknownValueType { name: String, code: i32 },

    #[error("variable '{name}' has non-positive element count {count}")]
    NonPositiveCount { name: String, count: i32 },

    #[error("variable '{name}' has invalid count-as-time flag {flag}")]
    CountAsTimeFlag { name: String, flag: u8 },

    #[error("variable '{name}' range {start}..{end} exceeds buffer length {buffer_len}")]
    VariableOutOfBounds { name: String, start: usize, end: usize, buffer_len: usize },

    #[error("variables '{first}' and '{second}' overlap")]
    VariableOverlap { first: String, second: String },
}

/// Why a command argument does not fit its wire slot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeViolation {
    #[error("{value} not in {min}..={max}")]
    Bounds { value: i64, min: i64, max: i64 },

    #[error("scaled value is not finite")]
    NonFinite,
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::ReadTimeout { .. } => true,
            TelemetryError::InconsistentSnapshot { .. } => true,
            TelemetryError::Connection { .. } => true,
            TelemetryError::Dispatch { .. } => true,
            TelemetryError::MalformedHeader { .. } => false,
            TelemetryError::UnsupportedVersion { .. } => false,
            TelemetryError::TypeMismatch { .. } => false,
            TelemetryError::IndexOutOfRange { .. } => false,
            TelemetryError::OutOfBounds { .. } => false,
            TelemetryError::VariableNotFound { .. } => false,
            TelemetryError::ArgumentOutOfRange { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns whether this error invalidates the connection that produced it.
    ///
    /// Header errors mean nothing above the header can be trusted, so the connection
    /// attempt must be abandoned and reported.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TelemetryError::MalformedHeader { .. }
                | TelemetryError::UnsupportedVersion { .. }
                | TelemetryError::UnsupportedPlatform { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::MalformedHeader { .. } => vec![
                "Reconnect once the simulator has finished loading",
                "Verify the simulator build is supported",
                "Report the violated invariant with the simulator version",
            ],
            TelemetryError::UnsupportedVersion { .. } => vec![
                "Update the library to a version that understands this header",
                "Check the simulator SDK compatibility notes",
            ],
            TelemetryError::ReadTimeout { .. } => vec![
                "Retry the read",
                "Increase the reader wait timeout",
                "Verify the simulator is running and on track",
            ],
            TelemetryError::InconsistentSnapshot { .. } => vec![
                "Retry the read",
                "Increase the reader retry budget",
                "Check system load if this happens continuously",
            ],
            TelemetryError::TypeMismatch { .. } => vec![
                "Request the representation matching the variable's value type",
                "Check the descriptor's value type before reading",
            ],
            TelemetryError::IndexOutOfRange { .. } => vec![
                "Check the descriptor's value count before indexing",
                "Use the array read to fetch every element",
            ],
            TelemetryError::OutOfBounds { .. } => vec![
                "Only read snapshots with descriptors from the same connection",
                "Reconnect to refresh the header",
            ],
            TelemetryError::VariableNotFound { .. } => vec![
                "Check variable name spelling (names are case-sensitive)",
                "Register interest and wait for activation if the variable is conditional",
            ],
            TelemetryError::ArgumentOutOfRange { .. } => {
                vec![
                    "Clamp the argument to the command's documented range",
                    "Use a finite value for scaled arguments",
                ]
            }
            TelemetryError::Dispatch { .. } => vec![
                "Verify the simulator is running",
                "Resend only if the command is idempotent",
            ],
            TelemetryError::Connection { .. } => vec![
                "Ensure the simulator is running",
                "Check permissions for shared memory access",
                "Retry the connection",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Use platform-appropriate features",
                "Substitute a recording sink or synthetic store for testing",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify system resources availability",
                "Check Windows version compatibility",
            ],
        }
    }

    /// Helper constructor for header violations.
    pub fn malformed(violation: HeaderViolation) -> Self {
        TelemetryError::MalformedHeader { violation }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for dispatch errors.
    pub fn dispatch_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Dispatch { reason: reason.into(), source: None }
    }

    /// Helper constructor for dispatch errors with source.
    pub fn dispatch_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Dispatch { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for type mismatches.
    pub fn type_mismatch(
        variable: impl Into<String>,
        actual: VariableType,
        requested: &'static str,
    ) -> Self {
        TelemetryError::TypeMismatch { variable: variable.into(), actual, requested }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<HeaderViolation> for TelemetryError {
    fn from(violation: HeaderViolation) -> Self {
        TelemetryError::MalformedHeader { violation }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            name in "[A-Za-z][A-Za-z0-9_]{0,30}",
            index in 0usize..1000,
            count in 0usize..1000,
            attempts in 1u32..100,
            reason in ".*",
        ) {
            let mismatch = TelemetryError::type_mismatch(name.clone(), VariableType::Bool, "f32");
            prop_assert!(mismatch.to_string().contains(&name));
            prop_assert!(mismatch.to_string().contains("f32"));

            let index_err = TelemetryError::IndexOutOfRange { variable: name.clone(), index, count };
            prop_assert!(index_err.to_string().contains(&index.to_string()));

            let inconsistent = TelemetryError::InconsistentSnapshot { attempts };
            prop_assert!(inconsistent.to_string().contains(&attempts.to_string()));

            let dispatch = TelemetryError::dispatch_failed(reason.clone());
            prop_assert!(dispatch.to_string().contains(&reason));
        }

        #[test]
        fn header_violations_name_the_offending_variable(name in "[A-Za-z]{1,31}", code in 6i32..1000) {
            let err: TelemetryError =
                HeaderViolation::UnknownValueType { name: name.clone(), code }.into();
            let message = err.to_string();
            prop_assert!(message.contains(&name));
            prop_assert!(message.contains(&code.to_string()));
            prop_assert!(err.is_fatal());
            prop_assert!(!err.is_retryable());
        }
    }

    #[test]
    fn argument_errors_share_one_variant() {
        let non_finite = TelemetryError::ArgumentOutOfRange {
            command: CommandId::FORCE_FEEDBACK,
            slot: 2,
            violation: RangeViolation::NonFinite,
        };
        let too_big = TelemetryError::ArgumentOutOfRange {
            command: CommandId::FORCE_FEEDBACK,
            slot: 2,
            violation: RangeViolation::Bounds { value: 1 << 40, min: 0, max: 65535 },
        };
        for err in [&non_finite, &too_big] {
            assert!(!err.is_retryable());
            assert!(!err.is_fatal());
            assert!(err.recovery_suggestions().contains(&"Use a finite value for scaled arguments"));
        }
        assert!(non_finite.to_string().contains("not finite"));
        assert!(too_big.to_string().contains("0..=65535"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();

        let error = TelemetryError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recoverable_and_fatal_classification() {
        let timeout = TelemetryError::ReadTimeout { duration: Duration::from_millis(10) };
        let torn = TelemetryError::InconsistentSnapshot { attempts: 3 };
        let version =
            TelemetryError::UnsupportedVersion { found: 1, min_supported: 2, max_supported: 2 };
        let malformed = TelemetryError::malformed(HeaderViolation::Uninitialized);

        assert!(timeout.is_retryable() && !timeout.is_fatal());
        assert!(torn.is_retryable() && !torn.is_fatal());
        assert!(!version.is_retryable() && version.is_fatal());
        assert!(!malformed.is_retryable() && malformed.is_fatal());
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            TelemetryError::ReadTimeout { duration: Duration::from_secs(1) },
            TelemetryError::malformed(HeaderViolation::BufferLength { len: 0 }),
            TelemetryError::dispatch_failed("no window"),
            TelemetryError::VariableNotFound { name: "Speed".into() },
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn dispatch_error_preserves_source_chain() {
        let io = std::io::Error::other("broadcast rejected");
        let err = TelemetryError::dispatch_failed_with_source("SendNotifyMessageW", Box::new(io));
        let source = std::error::Error::source(&err).expect("source should be chained");
        assert_eq!(source.to_string(), "broadcast rejected");
    }
}
