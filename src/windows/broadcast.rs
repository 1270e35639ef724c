//! Window-message command broadcast

use parking_lot::Mutex;
use tracing::{debug, trace};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    HWND_BROADCAST, RegisterWindowMessageW, SendNotifyMessageW,
};
use windows::core::PCWSTR;

use super::wide_string;
use crate::commands::{CommandMessage, CommandSink};
use crate::{Result, TelemetryError};

/// Posts commands to every top-level window under a registered message id.
#[derive(Debug)]
pub struct BroadcastSink {
    message_id: u32,
    // Serialises posts so concurrent senders never interleave.
    post: Mutex<()>,
}

impl BroadcastSink {
    /// Register `name` as a window message and build a sink for it.
    pub fn register(name: &str) -> Result<Self> {
        let wide_name = wide_string(name);
        let message_id = unsafe { RegisterWindowMessageW(PCWSTR::from_raw(wide_name.as_ptr())) };
        if message_id == 0 {
            let win_err = windows::core::Error::from_thread();
            return Err(TelemetryError::windows_api_error("RegisterWindowMessageW", win_err));
        }
        debug!(name, message_id, "Registered broadcast message");
        Ok(Self { message_id, post: Mutex::new(()) })
    }

    pub fn message_id(&self) -> u32 {
        self.message_id
    }
}

impl CommandSink for BroadcastSink {
    fn send(&self, message: &CommandMessage) -> Result<()> {
        let (param1, param2) = message.wire_params();
        // Sign-extend both parameters to pointer width.
        let wparam = WPARAM(param1 as isize as usize);
        let lparam = LPARAM(param2 as isize);

        let _guard = self.post.lock();
        trace!(command = %message.command(), param1, param2, "Posting broadcast message");
        unsafe { SendNotifyMessageW(HWND_BROADCAST, self.message_id, wparam, lparam) }.map_err(
            |e| TelemetryError::dispatch_failed_with_source("SendNotifyMessageW failed", Box::new(e)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DEFAULT_BROADCAST_MESSAGE;

    #[test]
    fn registering_same_name_yields_same_id() {
        let a = BroadcastSink::register(DEFAULT_BROADCAST_MESSAGE).unwrap();
        let b = BroadcastSink::register(DEFAULT_BROADCAST_MESSAGE).unwrap();
        assert_eq!(a.message_id(), b.message_id());
        assert!(a.message_id() >= 0xC000);
    }

    #[test]
    fn configured_name_registers_its_own_message() {
        let custom = BroadcastSink::register("PITLANE_TEST_BROADCAST").unwrap();
        let default = BroadcastSink::register(DEFAULT_BROADCAST_MESSAGE).unwrap();
        assert_ne!(custom.message_id(), default.message_id());

        let sink = crate::commands::broadcast_sink("PITLANE_TEST_BROADCAST").unwrap();
        assert!(format!("{sink:?}").contains(&format!("message_id: {}", custom.message_id())));
    }
}
