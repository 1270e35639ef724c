//! Wire message format
//!
//! The simulator receives commands as a registered window message carrying two
//! pointer-sized parameters:
//!
//! ```text
//! param1 = MAKELONG(command_id, arg1)
//! param2 = arg2                      (SlotLayout::Wide)
//!        = MAKELONG(arg2, arg3)      (SlotLayout::Split)
//! ```
//!
//! `MAKELONG(low, high)` places `low` in bits 0..16 and `high` in bits 16..32. Both
//! parameters are sign-extended 32-bit values on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a broadcast command.
///
/// Occupies the low 16 bits of the first wire parameter.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u16);

impl CommandId {
    pub const CAMERA_SWITCH_POSITION: Self = Self(0);
    pub const CAMERA_SWITCH_NUMBER: Self = Self(1);
    pub const CAMERA_SET_STATE: Self = Self(2);
    pub const REPLAY_SET_PLAY_SPEED: Self = Self(3);
    pub const REPLAY_SET_PLAY_POSITION: Self = Self(4);
    pub const REPLAY_SEARCH: Self = Self(5);
    pub const REPLAY_SET_STATE: Self = Self(6);
    pub const RELOAD_TEXTURES: Self = Self(7);
    pub const CHAT: Self = Self(8);
    pub const PIT: Self = Self(9);
    pub const TELEMETRY: Self = Self(10);
    pub const FORCE_FEEDBACK: Self = Self(11);
    pub const REPLAY_SEARCH_SESSION_TIME: Self = Self(12);
    pub const VIDEO_CAPTURE: Self = Self(13);

    /// Name of a catalogued command, `None` for ids outside the catalogue.
    pub fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "CameraSwitchPosition",
            1 => "CameraSwitchNumber",
            2 => "CameraSetState",
            3 => "ReplaySetPlaySpeed",
            4 => "ReplaySetPlayPosition",
            5 => "ReplaySearch",
            6 => "ReplaySetState",
            7 => "ReloadTextures",
            8 => "Chat",
            9 => "Pit",
            10 => "Telemetry",
            11 => "ForceFeedback",
            12 => "ReplaySearchSessionTime",
            13 => "VideoCapture",
            _ => return None,
        })
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "#{}", self.0),
        }
    }
}

impl From<u16> for CommandId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// How the three argument slots map onto the wire parameters.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SlotLayout {
    /// arg2 fills the whole second parameter; arg3 must be zero.
    Wide = 0,
    /// arg2 and arg3 share the second parameter as two half-words.
    #[default]
    Split = 1,
}

/// Width class of one argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWidth {
    /// 16 bits, accepting signed or unsigned half-word values
    Half,
    /// 32 bits
    Full,
    /// Unused slot that must carry zero
    Unused,
}

impl SlotWidth {
    /// Inclusive range of values the slot accepts.
    pub const fn range(self) -> (i64, i64) {
        match self {
            SlotWidth::Half => (i16::MIN as i64, u16::MAX as i64),
            SlotWidth::Full => (i32::MIN as i64, i32::MAX as i64),
            SlotWidth::Unused => (0, 0),
        }
    }
}

impl SlotLayout {
    /// Width of slot `index` (0-based) under this layout.
    pub const fn slot_width(self, index: usize) -> SlotWidth {
        match (self, index) {
            (_, 0) => SlotWidth::Half,
            (SlotLayout::Wide, 1) => SlotWidth::Full,
            (SlotLayout::Wide, _) => SlotWidth::Unused,
            (SlotLayout::Split, _) => SlotWidth::Half,
        }
    }
}

/// A fixed-size encoded command.
///
/// Built only by [`encode`](super::encode), which guarantees every argument fits its
/// slot under the message's layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandMessage {
    command: CommandId,
    layout: SlotLayout,
    _pad: u8,
    args: [i32; 3],
}

const _: () = assert!(std::mem::size_of::<CommandMessage>() == 16);

fn make_long(low: i32, high: i32) -> i32 {
    (((high as u32 & 0xFFFF) << 16) | (low as u32 & 0xFFFF)) as i32
}

impl CommandMessage {
    pub(crate) fn new(command: CommandId, layout: SlotLayout, args: [i32; 3]) -> Self {
        Self { command, layout, _pad: 0, args }
    }

    pub fn command(&self) -> CommandId {
        self.command
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// The three encoded argument slots.
    pub fn args(&self) -> [i32; 3] {
        self.args
    }

    pub fn arg1(&self) -> i32 {
        self.args[0]
    }

    pub fn arg2(&self) -> i32 {
        self.args[1]
    }

    pub fn arg3(&self) -> i32 {
        self.args[2]
    }

    /// The two 32-bit wire parameters.
    pub fn wire_params(&self) -> (i32, i32) {
        let param1 = make_long(i32::from(self.command.0), self.args[0]);
        let param2 = match self.layout {
            SlotLayout::Wide => self.args[1],
            SlotLayout::Split => make_long(self.args[1], self.args[2]),
        };
        (param1, param2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<CommandMessage>(), 16);
        assert_eq!(std::mem::size_of::<CommandId>(), 2);
    }

    #[test]
    fn split_layout_packs_half_words() {
        let msg = CommandMessage::new(CommandId::CAMERA_SWITCH_POSITION, SlotLayout::Split, [3, 2, 1]);
        let (p1, p2) = msg.wire_params();
        assert_eq!(p1, 0x0003_0000);
        assert_eq!(p2, 0x0001_0002);
    }

    #[test]
    fn negative_half_word_is_twos_complement() {
        let msg = CommandMessage::new(CommandId::CAMERA_SWITCH_NUMBER, SlotLayout::Split, [-2, 0, 0]);
        let (p1, _) = msg.wire_params();
        assert_eq!(p1 as u32, 0xFFFE_0001);
    }

    #[test]
    fn wide_layout_keeps_full_second_parameter() {
        let msg = CommandMessage::new(CommandId::FORCE_FEEDBACK, SlotLayout::Wide, [0, 2_097_152, 0]);
        assert_eq!(msg.wire_params(), (0x0000_000B, 2_097_152));

        let msg = CommandMessage::new(CommandId::REPLAY_SET_PLAY_POSITION, SlotLayout::Wide, [0, -5, 0]);
        assert_eq!(msg.wire_params().1, -5);
    }

    #[test]
    fn display_names_known_ids() {
        assert_eq!(CommandId::PIT.to_string(), "Pit(9)");
        assert_eq!(CommandId(200).to_string(), "#200");
        assert_eq!(CommandId(14).name(), None);
    }

    #[test]
    fn slot_widths_follow_layout() {
        assert_eq!(SlotLayout::Wide.slot_width(0), SlotWidth::Half);
        assert_eq!(SlotLayout::Wide.slot_width(1), SlotWidth::Full);
        assert_eq!(SlotLayout::Wide.slot_width(2), SlotWidth::Unused);
        assert_eq!(SlotLayout::Split.slot_width(2), SlotWidth::Half);
        assert_eq!(SlotWidth::Half.range(), (-32768, 65535));
    }
}
