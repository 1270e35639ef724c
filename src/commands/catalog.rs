//! Command catalogue
//!
//! Each broadcast command is a plain struct implementing [`Command`], which fixes its
//! identifier, slot layout and the mapping from semantic fields to the three argument
//! slots. The catalogue is open: [`RawCommand`] sends any identifier with any arguments,
//! still subject to slot-range validation.
//!
//! | id | command | layout | arg1 | arg2 | arg3 |
//! |---|---|---|---|---|---|
//! | 0 | [`CameraSwitchPosition`] | split | focus/position | group | camera |
//! | 1 | [`CameraSwitchNumber`] | split | focus/car number | group | camera |
//! | 2 | [`CameraSetState`] | split | state bits | | |
//! | 3 | [`ReplaySetPlaySpeed`] | split | speed | slow motion | |
//! | 4 | [`ReplaySetPlayPosition`] | wide | mode | frame | |
//! | 5 | [`ReplaySearch`] | split | mode | | |
//! | 6 | [`ReplaySetState`] | split | mode | | |
//! | 7 | [`ReloadTextures`] | split | mode | car index | |
//! | 8 | [`Chat`] | split | mode | macro | |
//! | 9 | [`Pit`] | wide | command | parameter | |
//! | 10 | [`Telemetry`] | split | command | | |
//! | 11 | [`ForceFeedback`] | wide | command | scaled value | |
//! | 12 | [`ReplaySearchSessionTime`] | wide | session | time (ms) | |
//! | 13 | [`VideoCapture`] | split | mode | | |

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::{CommandId, SlotLayout};

/// One semantically typed argument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandArg {
    /// Copied verbatim
    Int(i32),
    /// Copied as its underlying code
    Enum(i32),
    /// Packed as 16.16 fixed point
    Scaled(f32),
}

impl CommandArg {
    /// An unused slot.
    pub const NONE: Self = CommandArg::Int(0);
}

impl From<bool> for CommandArg {
    fn from(value: bool) -> Self {
        CommandArg::Int(value as i32)
    }
}

/// A command that can be encoded into a [`CommandMessage`](super::CommandMessage).
pub trait Command {
    fn id(&self) -> CommandId;

    fn layout(&self) -> SlotLayout {
        SlotLayout::Split
    }

    fn args(&self) -> [CommandArg; 3];

    /// Tighter bounds for the argument at `index` than its slot width allows.
    fn arg_range(&self, _index: usize) -> Option<(i64, i64)> {
        None
    }
}

/// Camera focus target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraFocus {
    Incident,
    Leader,
    Exciting,
    /// A car, by race position or car number depending on the command
    Car(u16),
}

impl CameraFocus {
    pub fn code(self) -> i32 {
        match self {
            CameraFocus::Incident => -3,
            CameraFocus::Leader => -2,
            CameraFocus::Exciting => -1,
            CameraFocus::Car(n) => i32::from(n),
        }
    }
}

/// Camera tool state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CameraState(pub u16);

impl CameraState {
    pub const IS_SESSION_SCREEN: Self = Self(0x0001);
    pub const IS_SCENIC_ACTIVE: Self = Self(0x0002);
    pub const CAM_TOOL_ACTIVE: Self = Self(0x0004);
    pub const UI_HIDDEN: Self = Self(0x0008);
    pub const USE_AUTO_SHOT_SELECTION: Self = Self(0x0010);
    pub const USE_TEMPORARY_EDITS: Self = Self(0x0020);
    pub const USE_KEY_ACCELERATION: Self = Self(0x0040);
    pub const USE_KEY_10X_ACCELERATION: Self = Self(0x0080);
    pub const USE_MOUSE_AIM_MODE: Self = Self(0x0100);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CameraState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayPositionMode {
    Begin = 0,
    Current = 1,
    End = 2,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplaySearchMode {
    ToStart = 0,
    ToEnd = 1,
    PrevSession = 2,
    NextSession = 3,
    PrevLap = 4,
    NextLap = 5,
    PrevFrame = 6,
    NextFrame = 7,
    PrevIncident = 8,
    NextIncident = 9,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayStateMode {
    EraseTape = 0,
}

/// Which textures to reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureReload {
    All,
    Car(u16),
}

/// Chat actions.
///
/// `Macro` holds the 0-based wire index, 0 through [`MAX_MACRO`](Self::MAX_MACRO). The
/// simulator UI numbers the same macros 1 through 15; use [`ui_macro`](Self::ui_macro)
/// to convert. Larger indices are rejected at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatCommand {
    Macro(u8),
    BeginChat,
    Reply,
    Cancel,
}

impl ChatCommand {
    /// Highest macro index on the wire.
    pub const MAX_MACRO: u8 = 14;

    /// Macro numbered `number` in the simulator UI (1 through 15).
    pub fn ui_macro(number: u8) -> Option<Self> {
        match number {
            1..=15 => Some(ChatCommand::Macro(number - 1)),
            _ => None,
        }
    }
}

/// Pit service requests.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitCommand {
    /// Clear all pit checkboxes
    Clear = 0,
    /// Clean the windshield
    Windshield = 1,
    /// Add fuel; parameter is litres, 0 keeps the current amount
    Fuel = 2,
    /// Change left front tyre; parameter is pressure in kPa, 0 keeps the current one
    LeftFront = 3,
    RightFront = 4,
    LeftRear = 5,
    RightRear = 6,
    ClearTires = 7,
    FastRepair = 8,
    ClearWindshield = 9,
    ClearFastRepair = 10,
    ClearFuel = 11,
    /// Change tyre compound; parameter is the compound index
    TireCompound = 12,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryCommand {
    Stop = 0,
    Start = 1,
    Restart = 2,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FfbCommand {
    /// Set the maximum wheel force in Nm
    MaxForce = 0,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCaptureMode {
    Screenshot = 0,
    Start = 1,
    End = 2,
    Toggle = 3,
    ShowTimer = 4,
    HideTimer = 5,
}

/// Switch the camera to a focus target, selecting cars by race position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSwitchPosition {
    pub focus: CameraFocus,
    pub group: u16,
    pub camera: u16,
}

impl Command for CameraSwitchPosition {
    fn id(&self) -> CommandId {
        CommandId::CAMERA_SWITCH_POSITION
    }

    fn args(&self) -> [CommandArg; 3] {
        [
            CommandArg::Enum(self.focus.code()),
            CommandArg::Int(self.group.into()),
            CommandArg::Int(self.camera.into()),
        ]
    }
}

/// Switch the camera to a focus target, selecting cars by car number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSwitchNumber {
    pub focus: CameraFocus,
    pub group: u16,
    pub camera: u16,
}

impl Command for CameraSwitchNumber {
    fn id(&self) -> CommandId {
        CommandId::CAMERA_SWITCH_NUMBER
    }

    fn args(&self) -> [CommandArg; 3] {
        [
            CommandArg::Enum(self.focus.code()),
            CommandArg::Int(self.group.into()),
            CommandArg::Int(self.camera.into()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSetState {
    pub state: CameraState,
}

impl Command for CameraSetState {
    fn id(&self) -> CommandId {
        CommandId::CAMERA_SET_STATE
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Int(self.state.0.into()), CommandArg::NONE, CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySetPlaySpeed {
    /// Playback speed multiplier; negative plays backwards
    pub speed: i16,
    /// Interpret `speed` as a slow-motion divisor
    pub slow_motion: bool,
}

impl Command for ReplaySetPlaySpeed {
    fn id(&self) -> CommandId {
        CommandId::REPLAY_SET_PLAY_SPEED
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Int(self.speed.into()), self.slow_motion.into(), CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySetPlayPosition {
    pub mode: ReplayPositionMode,
    pub frame: i32,
}

impl Command for ReplaySetPlayPosition {
    fn id(&self) -> CommandId {
        CommandId::REPLAY_SET_PLAY_POSITION
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout::Wide
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.mode as i32), CommandArg::Int(self.frame), CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySearch {
    pub mode: ReplaySearchMode,
}

impl Command for ReplaySearch {
    fn id(&self) -> CommandId {
        CommandId::REPLAY_SEARCH
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.mode as i32), CommandArg::NONE, CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySetState {
    pub mode: ReplayStateMode,
}

impl Command for ReplaySetState {
    fn id(&self) -> CommandId {
        CommandId::REPLAY_SET_STATE
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.mode as i32), CommandArg::NONE, CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadTextures {
    pub target: TextureReload,
}

impl Command for ReloadTextures {
    fn id(&self) -> CommandId {
        CommandId::RELOAD_TEXTURES
    }

    fn args(&self) -> [CommandArg; 3] {
        match self.target {
            TextureReload::All => [CommandArg::Enum(0), CommandArg::NONE, CommandArg::NONE],
            TextureReload::Car(car_idx) => {
                [CommandArg::Enum(1), CommandArg::Int(car_idx.into()), CommandArg::NONE]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub command: ChatCommand,
}

impl Command for Chat {
    fn id(&self) -> CommandId {
        CommandId::CHAT
    }

    fn args(&self) -> [CommandArg; 3] {
        match self.command {
            ChatCommand::Macro(n) => [CommandArg::Enum(0), CommandArg::Int(n.into()), CommandArg::NONE],
            ChatCommand::BeginChat => [CommandArg::Enum(1), CommandArg::NONE, CommandArg::NONE],
            ChatCommand::Reply => [CommandArg::Enum(2), CommandArg::NONE, CommandArg::NONE],
            ChatCommand::Cancel => [CommandArg::Enum(3), CommandArg::NONE, CommandArg::NONE],
        }
    }

    fn arg_range(&self, index: usize) -> Option<(i64, i64)> {
        match (self.command, index) {
            (ChatCommand::Macro(_), 1) => Some((0, i64::from(ChatCommand::MAX_MACRO))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pit {
    pub command: PitCommand,
    pub parameter: i32,
}

impl Command for Pit {
    fn id(&self) -> CommandId {
        CommandId::PIT
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout::Wide
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.command as i32), CommandArg::Int(self.parameter), CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub command: TelemetryCommand,
}

impl Command for Telemetry {
    fn id(&self) -> CommandId {
        CommandId::TELEMETRY
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.command as i32), CommandArg::NONE, CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceFeedback {
    pub command: FfbCommand,
    pub value: f32,
}

impl Command for ForceFeedback {
    fn id(&self) -> CommandId {
        CommandId::FORCE_FEEDBACK
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout::Wide
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.command as i32), CommandArg::Scaled(self.value), CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySearchSessionTime {
    pub session: u16,
    pub time_ms: i32,
}

impl Command for ReplaySearchSessionTime {
    fn id(&self) -> CommandId {
        CommandId::REPLAY_SEARCH_SESSION_TIME
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout::Wide
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Int(self.session.into()), CommandArg::Int(self.time_ms), CommandArg::NONE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCapture {
    pub mode: VideoCaptureMode,
}

impl Command for VideoCapture {
    fn id(&self) -> CommandId {
        CommandId::VIDEO_CAPTURE
    }

    fn args(&self) -> [CommandArg; 3] {
        [CommandArg::Enum(self.mode as i32), CommandArg::NONE, CommandArg::NONE]
    }
}

/// Any command, including identifiers outside the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    pub id: CommandId,
    pub layout: SlotLayout,
    pub args: [CommandArg; 3],
}

impl Command for RawCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn layout(&self) -> SlotLayout {
        self.layout
    }

    fn args(&self) -> [CommandArg; 3] {
        self.args
    }
}
