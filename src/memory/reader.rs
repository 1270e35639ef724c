//! Consistent snapshot reads
//!
//! The publisher never waits for readers. Instead every buffer slot carries a tick
//! counter used as a sequence lock:
//!
//! | step | publisher | reader |
//! |---|---|---|
//! | 1 | store odd counter (`Relaxed`) | load counter (`Acquire`), skip odd or zero |
//! | 2 | `fence(Release)` | copy payload |
//! | 3 | write payload | `fence(Acquire)` |
//! | 4 | store even counter (`Release`) | reload counter (`Relaxed`), compare |
//!
//! The publisher's release fence orders the odd store before any payload write, and the
//! reader's acquire fence orders its payload reads before the reload. A reader that sees
//! the same even value on both loads therefore copied bytes from exactly one completed
//! write. Anything else is a torn copy and is discarded.
//!
//! A read is an explicit bounded state machine:
//!
//! ```text
//! Selecting ──> Copying ──> Verifying ──> Done
//!     ^                          │
//!     └──────── Retry <──────────┘ ──> Failed (after max_retries)
//! ```

use std::sync::Arc;
use std::sync::atomic::{Ordering, fence};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{ReadySignal, SharedStore, WaitResult};
use crate::types::tick_after;
use crate::{Result, SnapshotCopy, TelemetryError};

/// Longest single wait issued when the configured wait is unbounded.
const UNBOUNDED_WAIT_CHUNK: Duration = Duration::from_millis(500);

/// Pause after a wake-up that produced nothing new.
const SPURIOUS_WAKE_BACKOFF: Duration = Duration::from_millis(1);

/// Snapshot reader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Upper bound on waiting for a new snapshot; `None` waits indefinitely.
    pub wait_timeout: Option<Duration>,
    /// Extra attempts after a torn copy before giving up.
    pub max_retries: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { wait_timeout: Some(Duration::from_secs(1)), max_retries: 8 }
    }
}

impl ReaderConfig {
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

enum ReadState {
    Selecting { attempt: u32 },
    Copying { slot: usize, tick: i32, attempt: u32 },
    Verifying { slot: usize, tick: i32, attempt: u32, data: Vec<u8> },
    Retry { attempt: u32 },
    Done(SnapshotCopy),
    Failed { attempts: u32 },
}

/// Pick the slot with the highest completed tick counter.
///
/// A slot is selectable when its counter is even (not being written) and non-zero
/// (published at least once).
fn select_slot(store: &SharedStore) -> Option<(usize, i32)> {
    let mut best: Option<(usize, i32)> = None;
    for slot in 0..store.header().buffer_count() {
        let tick = store.tick_counter(slot).load(Ordering::Acquire);
        if tick == 0 || tick & 1 != 0 {
            continue;
        }
        if best.is_none_or(|(_, best_tick)| tick_after(tick, best_tick)) {
            best = Some((slot, tick));
        }
    }
    best
}

/// Run the sequence-lock state machine once.
///
/// Returns `Ok(None)` when no selectable slot is newer than `newer_than`.
pub(crate) fn acquire(
    store: &SharedStore,
    max_retries: u32,
    newer_than: Option<i32>,
) -> Result<Option<SnapshotCopy>> {
    let mut state = ReadState::Selecting { attempt: 1 };

    loop {
        state = match state {
            ReadState::Selecting { attempt } => match select_slot(store) {
                None => return Ok(None),
                Some((_, tick)) if newer_than.is_some_and(|last| !tick_after(tick, last)) => {
                    return Ok(None);
                }
                Some((slot, tick)) => ReadState::Copying { slot, tick, attempt },
            },
            ReadState::Copying { slot, tick, attempt } => {
                let mut data = vec![0u8; store.header().buffer_length()];
                store.copy_slot(slot, &mut data);
                ReadState::Verifying { slot, tick, attempt, data }
            }
            ReadState::Verifying { slot, tick, attempt, data } => {
                fence(Ordering::Acquire);
                let after = store.tick_counter(slot).load(Ordering::Relaxed);
                if after == tick {
                    ReadState::Done(SnapshotCopy::new(data, tick, slot))
                } else {
                    debug!(slot, tick, after, attempt, "Slot changed during copy");
                    ReadState::Retry { attempt }
                }
            }
            ReadState::Retry { attempt } if attempt > max_retries => {
                ReadState::Failed { attempts: attempt }
            }
            ReadState::Retry { attempt } => ReadState::Selecting { attempt: attempt + 1 },
            ReadState::Done(snapshot) => {
                trace!(slot = snapshot.slot(), tick = snapshot.tick(), "Snapshot acquired");
                return Ok(Some(snapshot));
            }
            ReadState::Failed { attempts } => {
                warn!(attempts, "No consistent snapshot within retry budget");
                return Err(TelemetryError::InconsistentSnapshot { attempts });
            }
        };
    }
}

/// Produces consistent, caller-owned snapshot copies from a [`SharedStore`].
///
/// Each reader tracks the tick of the last snapshot it returned, so [`read`](Self::read)
/// never returns the same snapshot twice. Readers are independent of each other; any
/// number may share one store.
pub struct SnapshotReader {
    store: Arc<SharedStore>,
    signal: Arc<dyn ReadySignal>,
    config: ReaderConfig,
    last_tick: Option<i32>,
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("config", &self.config)
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}

impl SnapshotReader {
    pub fn new(store: Arc<SharedStore>, signal: Arc<dyn ReadySignal>, config: ReaderConfig) -> Self {
        Self { store, signal, config, last_tick: None }
    }

    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Tick of the last snapshot returned by [`read`](Self::read).
    pub fn last_tick(&self) -> Option<i32> {
        self.last_tick
    }

    /// Return the current completed slot without waiting.
    ///
    /// Does not consult or update the last returned tick. `Ok(None)` means no slot has
    /// completed yet.
    pub fn latest(&self) -> Result<Option<SnapshotCopy>> {
        acquire(&self.store, self.config.max_retries, None)
    }

    fn try_next(&mut self) -> Result<Option<SnapshotCopy>> {
        let snapshot = acquire(&self.store, self.config.max_retries, self.last_tick)?;
        if let Some(snapshot) = &snapshot {
            self.last_tick = Some(snapshot.tick());
        }
        Ok(snapshot)
    }

    fn next_wait(&self, deadline: Option<Instant>) -> Result<Duration> {
        match (deadline, self.config.wait_timeout) {
            (Some(deadline), Some(duration)) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!(?duration, "Snapshot wait timed out");
                    return Err(TelemetryError::ReadTimeout { duration });
                }
                Ok(deadline - now)
            }
            _ => Ok(UNBOUNDED_WAIT_CHUNK),
        }
    }

    /// Block until a snapshot newer than the last one returned is available.
    ///
    /// Returns immediately when one already is. Fails with `ReadTimeout` once the
    /// configured wait elapses, or `InconsistentSnapshot` when every copy tore.
    pub fn read(&mut self) -> Result<SnapshotCopy> {
        let deadline = self.config.wait_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if let Some(snapshot) = self.try_next()? {
                return Ok(snapshot);
            }

            let wait = self.next_wait(deadline)?;
            if self.signal.wait(wait)? == WaitResult::Signaled {
                if let Some(snapshot) = self.try_next()? {
                    return Ok(snapshot);
                }
                std::thread::sleep(SPURIOUS_WAKE_BACKOFF);
            }
        }
    }

    /// Async variant of [`read`](Self::read).
    ///
    /// The readiness wait runs on tokio's blocking pool so the calling task yields
    /// instead of stalling a runtime worker.
    pub async fn read_async(&mut self) -> Result<SnapshotCopy> {
        let deadline = self.config.wait_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if let Some(snapshot) = self.try_next()? {
                return Ok(snapshot);
            }

            let wait = self.next_wait(deadline)?;
            let signal = Arc::clone(&self.signal);
            let result = tokio::task::spawn_blocking(move || signal.wait(wait))
                .await
                .map_err(|e| TelemetryError::Connection {
                    reason: "readiness wait task failed".to_string(),
                    source: Some(Box::new(e)),
                })??;
            trace!(?result, "Async readiness wait finished");

            // A manual-reset event can stay set with nothing new behind it.
            if result == WaitResult::Signaled {
                if let Some(snapshot) = self.try_next()? {
                    return Ok(snapshot);
                }
                tokio::time::sleep(SPURIOUS_WAKE_BACKOFF).await;
            }
        }
    }
}
