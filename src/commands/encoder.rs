//! Command encoding with slot-range validation

use tracing::trace;

use super::packing::{self, PackError};
use super::{Command, CommandArg, CommandMessage, SlotWidth};
use crate::{RangeViolation, Result, TelemetryError};

/// Encode `command` into a wire message.
///
/// Every slot is checked against the width its layout assigns it, narrowed by the
/// command's own [`arg_range`](Command::arg_range); nothing is truncated silently. Scaled arguments are packed to 16.16 fixed point first. Errors name the
/// offending slot 1-based.
pub fn encode<C: Command + ?Sized>(command: &C) -> Result<CommandMessage> {
    let id = command.id();
    let layout = command.layout();
    let mut encoded = [0i32; 3];

    for (index, arg) in command.args().into_iter().enumerate() {
        let slot = index as u8 + 1;
        let value = match arg {
            CommandArg::Int(v) | CommandArg::Enum(v) => v,
            CommandArg::Scaled(v) => packing::pack(f64::from(v)).map_err(|err| {
                let violation = match err {
                    PackError::NonFinite { .. } => RangeViolation::NonFinite,
                    PackError::OutOfRange { scaled, .. } => RangeViolation::Bounds {
                        value: scaled as i64,
                        min: i64::from(i32::MIN),
                        max: i64::from(i32::MAX),
                    },
                };
                TelemetryError::ArgumentOutOfRange { command: id, slot, violation }
            })?,
        };

        let width = layout.slot_width(index);
        let (min, max) = match command.arg_range(index) {
            Some((lo, hi)) => {
                let (slot_min, slot_max) = width.range();
                (lo.max(slot_min), hi.min(slot_max))
            }
            None => width.range(),
        };
        let wide = i64::from(value);
        if wide < min || wide > max {
            return Err(TelemetryError::ArgumentOutOfRange {
                command: id,
                slot,
                violation: RangeViolation::Bounds { value: wide, min, max },
            });
        }
        if width != SlotWidth::Unused {
            encoded[index] = value;
        }
    }

    trace!(command = %id, ?layout, args = ?encoded, "Encoded command");
    Ok(CommandMessage::new(id, layout, encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::*;

    #[test]
    fn camera_switch_to_leader() {
        let msg = encode(&CameraSwitchPosition { focus: CameraFocus::Leader, group: 3, camera: 1 })
            .unwrap();
        assert_eq!(msg.command(), CommandId::CAMERA_SWITCH_POSITION);
        assert_eq!(msg.args(), [-2, 3, 1]);
        let (p1, p2) = msg.wire_params();
        assert_eq!(p1 as u32, 0xFFFE_0000);
        assert_eq!(p2, 0x0001_0003);
    }

    #[test]
    fn force_feedback_scales_value() {
        let msg = encode(&ForceFeedback { command: FfbCommand::MaxForce, value: 32.0 }).unwrap();
        assert_eq!(msg.layout(), SlotLayout::Wide);
        assert_eq!(msg.args(), [0, 2_097_152, 0]);
        assert_eq!(msg.wire_params(), (11, 2_097_152));
    }

    #[test]
    fn non_finite_scaled_argument_is_rejected() {
        let err = encode(&ForceFeedback { command: FfbCommand::MaxForce, value: f32::NAN })
            .unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::ArgumentOutOfRange {
                command: CommandId::FORCE_FEEDBACK,
                slot: 2,
                violation: RangeViolation::NonFinite,
            }
        ));

        let infinite = ForceFeedback { command: FfbCommand::MaxForce, value: f32::NEG_INFINITY };
        assert!(matches!(encode(&infinite), Err(TelemetryError::ArgumentOutOfRange { slot: 2, .. })));
    }

    #[test]
    fn oversized_scaled_argument_is_rejected() {
        let err = encode(&ForceFeedback { command: FfbCommand::MaxForce, value: 40_000.0 })
            .unwrap_err();
        assert!(matches!(err, TelemetryError::ArgumentOutOfRange { slot: 2, .. }));
    }

    #[test]
    fn half_slot_rejects_values_beyond_sixteen_bits() {
        let raw = RawCommand {
            id: CommandId::CAMERA_SWITCH_NUMBER,
            layout: SlotLayout::Split,
            args: [CommandArg::Int(70_000), CommandArg::NONE, CommandArg::NONE],
        };
        match encode(&raw).unwrap_err() {
            TelemetryError::ArgumentOutOfRange { slot, violation, .. } => {
                assert_eq!(slot, 1);
                assert_eq!(violation, RangeViolation::Bounds { value: 70_000, min: -32768, max: 65535 });
            }
            other => panic!("unexpected error: {other}"),
        }

        let below = RawCommand { args: [CommandArg::Int(-32769), CommandArg::NONE, CommandArg::NONE], ..raw };
        assert!(encode(&below).is_err());

        let edge = RawCommand { args: [CommandArg::Int(65535), CommandArg::Int(-32768), CommandArg::NONE], ..raw };
        assert!(encode(&edge).is_ok());
    }

    #[test]
    fn chat_macro_index_is_bounded() {
        let last = encode(&Chat { command: ChatCommand::Macro(ChatCommand::MAX_MACRO) }).unwrap();
        assert_eq!(last.args(), [0, 14, 0]);

        match encode(&Chat { command: ChatCommand::Macro(15) }).unwrap_err() {
            TelemetryError::ArgumentOutOfRange { command, slot, violation } => {
                assert_eq!((command, slot), (CommandId::CHAT, 2));
                assert_eq!(violation, RangeViolation::Bounds { value: 15, min: 0, max: 14 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ui_macro_numbers_shift_to_wire_indices() {
        assert_eq!(ChatCommand::ui_macro(1), Some(ChatCommand::Macro(0)));
        assert_eq!(ChatCommand::ui_macro(15), Some(ChatCommand::Macro(14)));
        assert_eq!(ChatCommand::ui_macro(0), None);
        assert_eq!(ChatCommand::ui_macro(16), None);

        let msg = encode(&Chat { command: ChatCommand::ui_macro(3).unwrap() }).unwrap();
        assert_eq!(msg.args(), [0, 2, 0]);
    }

    #[test]
    fn wide_layout_requires_empty_third_slot() {
        let raw = RawCommand {
            id: CommandId(42),
            layout: SlotLayout::Wide,
            args: [CommandArg::Int(1), CommandArg::Int(i32::MIN), CommandArg::Int(5)],
        };
        assert!(matches!(encode(&raw), Err(TelemetryError::ArgumentOutOfRange { slot: 3, .. })));

        let ok = RawCommand { args: [CommandArg::Int(1), CommandArg::Int(i32::MIN), CommandArg::NONE], ..raw };
        let msg = encode(&ok).unwrap();
        assert_eq!(msg.wire_params(), (0x0001_002A, i32::MIN));
    }

    #[test]
    fn pit_fuel_request_uses_full_second_slot() {
        let msg = encode(&Pit { command: PitCommand::Fuel, parameter: 100_000 }).unwrap();
        assert_eq!(msg.args(), [2, 100_000, 0]);
    }

    #[test]
    fn replay_position_accepts_negative_frames() {
        let msg = encode(&ReplaySetPlayPosition { mode: ReplayPositionMode::End, frame: -600 })
            .unwrap();
        assert_eq!(msg.wire_params(), (0x0002_0004, -600));
    }
}
