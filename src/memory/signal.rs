//! Readiness signalling
//!
//! The publisher announces each completed buffer slot through a named event. Readers
//! only ever wait on it; setting it is the publisher's job.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::Result;

/// Result of waiting for a readiness signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    Timeout,
}

/// A source of "new data published" notifications.
///
/// Implementations must return within `timeout`. Spurious `Signaled` results are
/// allowed; the reader rechecks the tick counters after every wake-up.
pub trait ReadySignal: Send + Sync {
    fn wait(&self, timeout: Duration) -> Result<WaitResult>;
}

/// In-process readiness signal with pulse semantics.
///
/// [`notify`](Self::notify) wakes every waiter that started waiting before it. Used by
/// synthetic publishers in tests and benchmarks, and by hosts that relay updates from
/// another transport.
#[derive(Debug, Default)]
pub struct InProcessSignal {
    generation: Mutex<u64>,
    condvar: Condvar,
}

impl InProcessSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake all current waiters.
    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Number of notifications so far.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }
}

impl ReadySignal for InProcessSignal {
    fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let deadline = Instant::now() + timeout;
        let mut generation = self.generation.lock();
        let start = *generation;

        while *generation == start {
            let now = Instant::now();
            if now >= deadline {
                trace!(?timeout, "In-process signal wait timed out");
                return Ok(WaitResult::Timeout);
            }
            self.condvar.wait_until(&mut generation, deadline);
        }

        Ok(WaitResult::Signaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_without_notify_times_out_within_bound() {
        let signal = InProcessSignal::new();
        let start = Instant::now();

        assert_eq!(signal.wait(Duration::from_millis(30)).unwrap(), WaitResult::Timeout);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_secs(2), "wait overran its bound: {elapsed:?}");
    }

    #[test]
    fn notify_wakes_waiting_thread() {
        let signal = Arc::new(InProcessSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait(Duration::from_secs(5)))
        };

        // Keep pulsing until the waiter has observed one.
        while !waiter.is_finished() {
            signal.notify();
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(waiter.join().unwrap().unwrap(), WaitResult::Signaled);
        assert!(signal.generation() > 0);
    }

    #[test]
    fn notify_before_wait_is_not_remembered() {
        let signal = InProcessSignal::new();
        signal.notify();
        assert_eq!(signal.wait(Duration::from_millis(5)).unwrap(), WaitResult::Timeout);
    }
}
