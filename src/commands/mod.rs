//! Broadcast commands
//!
//! Commands flow one way: a typed [`Command`] is [`encode`]d into a fixed-size
//! [`CommandMessage`] and handed to a [`CommandSink`]. On Windows the default sink posts
//! the message to every top-level window under a registered message name; elsewhere a
//! [`RecordingSink`] stands in.
//!
//! ```
//! use std::sync::Arc;
//! use pitlane::commands::{CameraFocus, CommandClient, RecordingSink};
//!
//! let sink = Arc::new(RecordingSink::new());
//! let client = CommandClient::new(sink.clone());
//! client.camera_switch_position(CameraFocus::Leader, 1, 0)?;
//! assert_eq!(sink.messages()[0].args(), [-2, 1, 0]);
//! # Ok::<(), pitlane::TelemetryError>(())
//! ```

mod catalog;
mod client;
mod encoder;
mod message;
pub mod packing;
mod sink;

pub use catalog::{
    CameraFocus, CameraSetState, CameraState, CameraSwitchNumber, CameraSwitchPosition, Chat,
    ChatCommand, Command, CommandArg, FfbCommand, ForceFeedback, Pit, PitCommand, RawCommand,
    ReloadTextures, ReplayPositionMode, ReplaySearch, ReplaySearchMode, ReplaySearchSessionTime,
    ReplaySetPlayPosition, ReplaySetPlaySpeed, ReplaySetState, ReplayStateMode, Telemetry,
    TelemetryCommand, TextureReload, VideoCapture, VideoCaptureMode,
};
pub use client::CommandClient;
pub use encoder::encode;
pub use message::{CommandId, CommandMessage, SlotLayout, SlotWidth};
pub use packing::{PackError, SCALE_FACTOR};
pub use sink::{CommandSink, RecordingSink, broadcast_sink, default_sink};
