//! Shared-memory snapshot access
//!
//! This module holds the telemetry read path:
//!
//! - [`SharedStore`] wraps the publisher's mapped region, parses its header once and
//!   exposes the live tick counters as atomics
//! - [`ReadySignal`] abstracts the named "data valid" event; [`InProcessSignal`] is the
//!   portable implementation
//! - [`SnapshotReader`] runs the sequence-lock retry protocol and hands out owned
//!   [`SnapshotCopy`](crate::SnapshotCopy) values
//!
//! The reader never writes to the region and never blocks the publisher. Any number of
//! readers may share one store; each performs its own tick checks.

mod reader;
mod signal;
mod store;

pub use reader::{ReaderConfig, SnapshotReader};
pub use signal::{InProcessSignal, ReadySignal, WaitResult};
pub use store::{SessionInfoText, SharedStore};
