//! Consistent shared-memory telemetry snapshots and broadcast commands for racing
//! simulators.
//!
//! Pitlane maps the simulator's published telemetry region read-only, copies whole
//! buffer slots out of it without ever blocking the publisher, and lets callers read
//! typed variables from those copies. In the other direction it encodes typed commands
//! into the simulator's fixed-size broadcast messages.
//!
//! # Features
//!
//! - **Torn-read free**: every [`SnapshotCopy`] is one publication, verified against the
//!   slot's tick counter after the copy
//! - **Validated headers**: malformed or unsupported headers are rejected before any
//!   variable is read
//! - **Typed access**: value-type/representation pairs are checked once, at bind time
//! - **Checked commands**: arguments that do not fit their wire slot are rejected, never
//!   truncated
//!
//! # Example
//!
//! ```rust,no_run
//! use pitlane::{Pitlane, Variable};
//! use pitlane::commands::CameraFocus;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Pitlane::connect()?;
//!     let speed: Variable<f32> = connection.header().variable("Speed")?;
//!
//!     let mut snapshots = connection.snapshots(4);
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("tick {}: {} m/s", snapshot.tick(), speed.read(&snapshot)?);
//!     }
//!
//!     Pitlane::commands()?.camera_switch_position(CameraFocus::Leader, 1, 0)?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Shared memory protocol
pub mod memory;
pub mod registry;
pub mod schema;

// Streaming and composition
pub mod connection;
pub mod driver;

// Outbound commands
pub mod commands;

// Windows transports
#[cfg(windows)]
pub mod windows;

pub use error::*;
pub use types::*;

pub use commands::{CommandClient, CommandSink};
pub use connection::{ConnectionConfig, TelemetryConnection};
pub use driver::SnapshotStream;
pub use memory::{ReaderConfig, SharedStore, SnapshotReader};
pub use registry::VariableRegistry;
pub use schema::{ConnectionHeader, ContentVersion};

/// Unified entry point for Pitlane connections and command clients.
///
/// ```rust,no_run
/// use pitlane::{ConnectionConfig, Pitlane, ReaderConfig};
/// use std::time::Duration;
///
/// # fn main() -> pitlane::Result<()> {
/// let config = ConnectionConfig::default()
///     .with_reader(ReaderConfig::default().with_wait_timeout(Some(Duration::from_millis(250))));
/// let connection = Pitlane::connect_with(config)?;
/// let mut reader = connection.reader();
/// let snapshot = reader.read()?;
/// # Ok(())
/// # }
/// ```
pub struct Pitlane;

impl Pitlane {
    /// Connect to the live simulator using the SDK's default object names.
    ///
    /// # Platform
    ///
    /// Only Windows hosts the simulator. Elsewhere this returns `UnsupportedPlatform`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Platform is not Windows
    /// - The simulator is not running, so the mapping or event does not exist
    /// - The header is malformed or of an unsupported version
    pub fn connect() -> Result<TelemetryConnection> {
        Self::connect_with(ConnectionConfig::default())
    }

    /// Connect using explicit object names and reader settings.
    pub fn connect_with(config: ConnectionConfig) -> Result<TelemetryConnection> {
        TelemetryConnection::open(config)
    }

    /// Command client bound to the process-wide broadcast sink.
    ///
    /// The sink is created on first use and shared by every client afterwards.
    pub fn commands() -> Result<CommandClient> {
        CommandClient::broadcast()
    }

    /// Command client broadcasting under `config.broadcast_message_name`.
    pub fn commands_with(config: &ConnectionConfig) -> Result<CommandClient> {
        CommandClient::broadcast_with(config)
    }
}
