//! Driver spawns and manages snapshot streaming tasks

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};

use crate::memory::SnapshotReader;
use crate::{SnapshotCopy, TelemetryError};

/// Consecutive non-fatal failures tolerated before the driver gives up.
const MAX_ERRORS: u32 = 10;

/// Stream of snapshots produced by a driver task.
///
/// Dropping the stream cancels the task.
#[derive(Debug)]
pub struct SnapshotStream {
    inner: ReceiverStream<SnapshotCopy>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl SnapshotStream {
    /// Token cancelled when this stream is dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the driver task. Snapshots already queued are still yielded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for SnapshotStream {
    type Item = SnapshotCopy;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Driver spawns the snapshot reader task
///
/// The task owns its [`SnapshotReader`] and moves every snapshot it reads into a bounded
/// channel, so a slow consumer applies backpressure instead of growing a queue.
pub struct Driver;

impl Driver {
    /// Spawn a reader task on the current tokio runtime.
    pub fn spawn(reader: SnapshotReader, capacity: usize) -> SnapshotStream {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            Self::reader_task(reader, tx, task_cancel).await;
        });

        SnapshotStream {
            inner: ReceiverStream::new(rx),
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    async fn reader_task(
        mut reader: SnapshotReader,
        tx: mpsc::Sender<SnapshotCopy>,
        cancel: CancellationToken,
    ) {
        info!("Snapshot reader task started");
        let mut snapshot_count = 0u64;
        let mut inconsistent_streak = 0u32;
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Snapshot reader cancelled");
                    break;
                }
                result = reader.read_async() => result,
            };

            match result {
                Ok(snapshot) => {
                    snapshot_count += 1;
                    inconsistent_streak = 0;
                    error_count = 0;
                    trace!(tick = snapshot.tick(), slot = snapshot.slot(), "Snapshot read");

                    let sent = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Snapshot reader cancelled while delivering");
                            break;
                        }
                        sent = tx.send(snapshot) => sent,
                    };
                    if sent.is_err() {
                        debug!("Snapshot receiver dropped, shutting down");
                        break;
                    }
                }
                Err(TelemetryError::ReadTimeout { duration }) => {
                    trace!(?duration, "No snapshot within wait timeout");
                }
                Err(TelemetryError::InconsistentSnapshot { attempts }) => {
                    inconsistent_streak += 1;
                    // 1ms, 2ms, 4ms, ... capped at 64ms
                    let backoff = Duration::from_millis(1 << inconsistent_streak.min(6));
                    warn!(attempts, streak = inconsistent_streak, ?backoff, "Snapshot kept tearing");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Fatal snapshot error, stopping reader");
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    warn!(error = %e, error_count, "Snapshot read failed");
                    if error_count >= MAX_ERRORS {
                        error!("Too many snapshot read errors, stopping reader");
                        break;
                    }
                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!(snapshot_count, "Snapshot reader task ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;
    use crate::memory::{InProcessSignal, ReaderConfig};
    use crate::test_utils::RegionBuilder;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn reader_with_publisher() -> anyhow::Result<(SnapshotReader, crate::test_utils::SyntheticPublisher)> {
        let signal = Arc::new(InProcessSignal::new());
        let (store, publisher) = RegionBuilder::new()
            .with_variable("Speed", VariableType::Float, 1)
            .build()
            .into_store()?;
        let reader = SnapshotReader::new(
            store,
            signal.clone(),
            ReaderConfig::default().with_wait_timeout(Some(Duration::from_millis(20))),
        );
        Ok((reader, publisher.with_signal(signal)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_yields_increasing_ticks() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt::try_init();
        let (reader, mut publisher) = reader_with_publisher()?;
        let stop = Arc::new(AtomicBool::new(false));
        let writer_stop = Arc::clone(&stop);
        let writer = std::thread::spawn(move || {
            let mut value = 0.0f32;
            while !writer_stop.load(Ordering::Relaxed) {
                value += 1.0;
                publisher.publish_with(|bytes| bytes[..4].copy_from_slice(&value.to_le_bytes()));
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        let stream = Driver::spawn(reader, 4);
        let snapshots: Vec<SnapshotCopy> = tokio::time::timeout(
            Duration::from_secs(5),
            stream.take(5).collect::<Vec<_>>(),
        )
        .await?;

        stop.store(true, Ordering::Relaxed);
        writer.join().map_err(|_| anyhow::anyhow!("writer panicked"))?;

        assert_eq!(snapshots.len(), 5);
        for pair in snapshots.windows(2) {
            assert!(crate::types::tick_after(pair[1].tick(), pair[0].tick()));
        }
        Ok(())
    }

    #[tokio::test]
    async fn timeouts_do_not_end_the_stream() -> anyhow::Result<()> {
        let (reader, mut publisher) = reader_with_publisher()?;
        let mut stream = Driver::spawn(reader, 1);

        // Several 20ms wait timeouts elapse before anything is published.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (_, tick) = publisher.publish_pattern(0);

        let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("stream ended"))?;
        assert_eq!(snapshot.tick(), tick);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_the_task() -> anyhow::Result<()> {
        let (reader, _publisher) = reader_with_publisher()?;
        let stream = Driver::spawn(reader, 1);
        let token = stream.cancellation_token();
        assert!(!token.is_cancelled());
        drop(stream);
        assert!(token.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_stream_ends() -> anyhow::Result<()> {
        let (reader, _publisher) = reader_with_publisher()?;
        let mut stream = Driver::spawn(reader, 1);
        stream.cancel();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next()).await?;
        assert!(next.is_none());
        Ok(())
    }
}
