//! High-level command client

use std::sync::Arc;

use tracing::{debug, warn};

use super::*;
use crate::{ConnectionConfig, Result};

/// Encodes commands and hands them to a [`CommandSink`].
///
/// Cheap to clone; clones share the sink. Any number of threads may send concurrently.
#[derive(Debug, Clone)]
pub struct CommandClient {
    sink: Arc<dyn CommandSink>,
}

impl CommandClient {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }

    /// Client backed by the process-wide broadcast sink.
    pub fn broadcast() -> Result<Self> {
        Ok(Self::new(default_sink()?))
    }

    /// Client broadcasting under the message name configured in `config`.
    pub fn broadcast_with(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::new(broadcast_sink(&config.broadcast_message_name)?))
    }

    pub fn sink(&self) -> &Arc<dyn CommandSink> {
        &self.sink
    }

    /// Encode and dispatch any command.
    pub fn send<C: Command + ?Sized>(&self, command: &C) -> Result<()> {
        let message = encode(command)?;
        debug!(command = %message.command(), args = ?message.args(), "Sending command");
        self.sink.send(&message).inspect_err(|err| {
            warn!(command = %message.command(), error = %err, "Command dispatch failed");
        })
    }

    pub fn camera_switch_position(&self, focus: CameraFocus, group: u16, camera: u16) -> Result<()> {
        self.send(&CameraSwitchPosition { focus, group, camera })
    }

    pub fn camera_switch_number(&self, focus: CameraFocus, group: u16, camera: u16) -> Result<()> {
        self.send(&CameraSwitchNumber { focus, group, camera })
    }

    pub fn camera_set_state(&self, state: CameraState) -> Result<()> {
        self.send(&CameraSetState { state })
    }

    pub fn replay_set_play_speed(&self, speed: i16, slow_motion: bool) -> Result<()> {
        self.send(&ReplaySetPlaySpeed { speed, slow_motion })
    }

    pub fn replay_set_play_position(&self, mode: ReplayPositionMode, frame: i32) -> Result<()> {
        self.send(&ReplaySetPlayPosition { mode, frame })
    }

    pub fn replay_search(&self, mode: ReplaySearchMode) -> Result<()> {
        self.send(&ReplaySearch { mode })
    }

    pub fn replay_erase_tape(&self) -> Result<()> {
        self.send(&ReplaySetState { mode: ReplayStateMode::EraseTape })
    }

    pub fn reload_textures(&self, target: TextureReload) -> Result<()> {
        self.send(&ReloadTextures { target })
    }

    pub fn chat(&self, command: ChatCommand) -> Result<()> {
        self.send(&Chat { command })
    }

    pub fn pit(&self, command: PitCommand, parameter: i32) -> Result<()> {
        self.send(&Pit { command, parameter })
    }

    pub fn telemetry(&self, command: TelemetryCommand) -> Result<()> {
        self.send(&Telemetry { command })
    }

    /// Set the maximum force-feedback force in Nm.
    pub fn ffb_max_force(&self, newton_metres: f32) -> Result<()> {
        self.send(&ForceFeedback { command: FfbCommand::MaxForce, value: newton_metres })
    }

    pub fn replay_search_session_time(&self, session: u16, time_ms: i32) -> Result<()> {
        self.send(&ReplaySearchSessionTime { session, time_ms })
    }

    pub fn video_capture(&self, mode: VideoCaptureMode) -> Result<()> {
        self.send(&VideoCapture { mode })
    }
}
