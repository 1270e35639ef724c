//! Command delivery targets

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::CommandMessage;
use crate::connection::DEFAULT_BROADCAST_MESSAGE;
use crate::{Result, TelemetryError};

/// Something that delivers encoded commands to the simulator.
///
/// Delivery is fire-and-forget: `Ok` means the message was handed to the transport, not
/// that the simulator acted on it.
pub trait CommandSink: Send + Sync + std::fmt::Debug {
    fn send(&self, message: &CommandMessage) -> Result<()>;
}

/// Sink that records every message it receives. Used in tests and on platforms
/// without a broadcast transport.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<CommandMessage>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, oldest first.
    pub fn messages(&self) -> Vec<CommandMessage> {
        self.messages.lock().clone()
    }

    /// Drain the recorded messages.
    pub fn take(&self) -> Vec<CommandMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make subsequent dispatches fail with a dispatch error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, message: &CommandMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TelemetryError::dispatch_failed("recording sink set to fail"));
        }
        self.messages.lock().push(*message);
        Ok(())
    }
}

static DEFAULT_SINK: OnceLock<Arc<dyn CommandSink>> = OnceLock::new();

/// Process-wide broadcast sink, created on first successful use.
///
/// A failed initialisation is not cached; the next call tries again.
pub fn default_sink() -> Result<Arc<dyn CommandSink>> {
    if let Some(sink) = DEFAULT_SINK.get() {
        return Ok(Arc::clone(sink));
    }
    let created = platform_sink(DEFAULT_BROADCAST_MESSAGE)?;
    Ok(Arc::clone(DEFAULT_SINK.get_or_init(|| created)))
}

/// Broadcast sink for the window message registered under `name`.
///
/// The SDK's default name resolves to the shared [`default_sink`].
pub fn broadcast_sink(name: &str) -> Result<Arc<dyn CommandSink>> {
    if name == DEFAULT_BROADCAST_MESSAGE {
        return default_sink();
    }
    platform_sink(name)
}

#[cfg(windows)]
fn platform_sink(name: &str) -> Result<Arc<dyn CommandSink>> {
    let sink = crate::windows::BroadcastSink::register(name)?;
    Ok(Arc::new(sink))
}

#[cfg(not(windows))]
fn platform_sink(name: &str) -> Result<Arc<dyn CommandSink>> {
    Err(TelemetryError::unsupported_platform(format!("Command broadcast ({name})"), "Windows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandId, SlotLayout};

    #[test]
    fn recording_sink_keeps_order_and_drains() {
        let sink = RecordingSink::new();
        for id in 0..3u16 {
            sink.send(&CommandMessage::new(CommandId(id), SlotLayout::Split, [0; 3])).unwrap();
        }
        assert_eq!(sink.len(), 3);
        let ids: Vec<u16> = sink.take().iter().map(|m| m.command().0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(sink.is_empty());
    }

    #[test]
    fn failing_sink_reports_dispatch_error() {
        let sink = RecordingSink::new();
        sink.set_failing(true);
        let err = sink
            .send(&CommandMessage::new(CommandId::PIT, SlotLayout::Wide, [0; 3]))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Dispatch { .. }));
        assert!(err.is_retryable());
        assert!(sink.is_empty());
    }

    #[cfg(not(windows))]
    #[test]
    fn default_sink_is_unavailable_off_windows() {
        assert!(matches!(default_sink(), Err(TelemetryError::UnsupportedPlatform { .. })));
    }

    #[cfg(not(windows))]
    #[test]
    fn broadcast_sink_uses_the_given_message_name() {
        match broadcast_sink("PITLANE_TEST_BROADCAST") {
            Err(TelemetryError::UnsupportedPlatform { feature, .. }) => {
                assert!(feature.contains("PITLANE_TEST_BROADCAST"), "{feature}");
            }
            other => panic!("expected UnsupportedPlatform, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_recording_keeps_every_message() {
        let sink = Arc::new(RecordingSink::new());
        let handles: Vec<_> = (0..4u16)
            .map(|id| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        sink.send(&CommandMessage::new(CommandId(id), SlotLayout::Split, [0; 3])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 200);
    }
}
