//! Windows transports
//!
//! The simulator publishes telemetry through a named file mapping paired with a named
//! manual-reset event, and accepts commands as a registered window message broadcast to
//! all top-level windows. This module adapts those kernel objects to the
//! platform-neutral [`SharedStore`](crate::memory::SharedStore),
//! [`ReadySignal`](crate::memory::ReadySignal) and
//! [`CommandSink`](crate::commands::CommandSink) seams.

mod broadcast;
mod connection;

pub use broadcast::BroadcastSink;
pub use connection::{NamedEventSignal, open_shared_store};

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
