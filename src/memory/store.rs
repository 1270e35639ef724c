//! Shared snapshot store access
//!
//! [`SharedStore`] wraps a mapped region owned by the publisher. The header is parsed
//! once from a private copy of the region prefix; afterwards the store only touches
//! buffer payload bytes and three live counters:
//!
//! - the per-slot tick counters (`varBuf[i].tickCount`)
//! - the status word (connected bit)
//! - the session-info update counter
//!
//! All three are read through [`AtomicI32`] views of the mapped memory so the memory
//! orderings documented in [`reader`](super::reader) are expressible.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicI32, Ordering, fence};

use tracing::{debug, trace, warn};

use crate::error::HeaderViolation;
use crate::schema::header::{SESSION_INFO_UPDATE_OFFSET, STATUS_OFFSET};
use crate::schema::{ConnectionHeader, HEADER_SIZE, STATUS_CONNECTED, tick_count_offset};
use crate::{Result, TelemetryError};

/// Session document text together with the counter it was copied under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfoText {
    /// Value of `sessionInfoUpdate` observed unchanged across the copy
    pub update: i32,
    /// Document text up to the first NUL (lossy UTF-8)
    pub text: String,
}

/// A validated, read-only view of a shared snapshot store.
pub struct SharedStore {
    base: NonNull<u8>,
    len: usize,
    header: ConnectionHeader,
    // Keeps the mapping alive for as long as `base` is dereferenced.
    _mapping: Box<dyn Send + Sync>,
}

// SAFETY: the store only reads the region, through atomics for the counters and raw
// copies for payload bytes. `_mapping` is itself Send + Sync and owns the region.
unsafe impl Send for SharedStore {}
unsafe impl Sync for SharedStore {}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl SharedStore {
    /// Validate the region at `base` and take ownership of its mapping guard.
    ///
    /// # Safety
    ///
    /// `base` must point to `len` readable bytes, aligned to 4 bytes, that remain mapped
    /// until `mapping` is dropped. Nothing but the external publisher may write them.
    pub unsafe fn from_raw_parts(
        base: NonNull<u8>,
        len: usize,
        mapping: Box<dyn Send + Sync>,
    ) -> Result<Self> {
        if len < HEADER_SIZE {
            return Err(HeaderViolation::TooShort { len, required: HEADER_SIZE }.into());
        }
        if base.as_ptr().align_offset(std::mem::align_of::<AtomicI32>()) != 0 {
            return Err(TelemetryError::connection_failed(
                "shared memory region is not aligned for atomic counters",
            ));
        }

        let mut fixed = [0u8; HEADER_SIZE];
        // SAFETY: len >= HEADER_SIZE per the check above and the caller's contract.
        unsafe { ptr::copy_nonoverlapping(base.as_ptr(), fixed.as_mut_ptr(), HEADER_SIZE) };

        let prefix_len = ConnectionHeader::required_prefix_len(&fixed).min(len);
        let mut prefix = vec![0u8; prefix_len];
        // SAFETY: prefix_len <= len.
        unsafe { ptr::copy_nonoverlapping(base.as_ptr(), prefix.as_mut_ptr(), prefix_len) };

        let header = ConnectionHeader::parse_with_region(&prefix, len)?;
        debug!(
            region_len = len,
            buffers = header.buffer_count(),
            variables = header.variable_count(),
            "Opened shared snapshot store"
        );

        Ok(Self { base, len, header, _mapping: mapping })
    }

    /// The header parsed when the store was opened.
    pub fn header(&self) -> &ConnectionHeader {
        &self.header
    }

    /// Mapped region length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn counter(&self, offset: usize) -> &AtomicI32 {
        debug_assert!(offset + 4 <= HEADER_SIZE && offset % 4 == 0);
        // SAFETY: offset lies inside the fixed header, which is inside the region, and is
        // 4-byte aligned because the base is. The reference cannot outlive `self`, which
        // keeps the mapping alive.
        unsafe { AtomicI32::from_ptr(self.base.as_ptr().add(offset).cast::<i32>()) }
    }

    /// Atomic view of slot `slot`'s tick counter.
    pub(crate) fn tick_counter(&self, slot: usize) -> &AtomicI32 {
        self.counter(tick_count_offset(slot))
    }

    /// Current tick counter of `slot`, loaded with `Acquire`.
    pub fn tick_count(&self, slot: usize) -> Option<i32> {
        (slot < self.header.buffer_count())
            .then(|| self.tick_counter(slot).load(Ordering::Acquire))
    }

    /// Copy slot `slot`'s payload into `dst`.
    ///
    /// The copy may race with the publisher. Callers must bracket it with tick counter
    /// loads and discard the bytes unless the counter is unchanged.
    pub(crate) fn copy_slot(&self, slot: usize, dst: &mut [u8]) {
        let Some(range) = self.header.buffer_range(slot) else {
            return;
        };
        debug_assert_eq!(dst.len(), range.len());
        let len = dst.len().min(range.len());
        trace!(slot, offset = range.start, len, "Copying buffer slot");
        // SAFETY: range was validated against the region length by the header parser.
        unsafe { ptr::copy_nonoverlapping(self.base.as_ptr().add(range.start), dst.as_mut_ptr(), len) };
    }

    /// Whether the publisher currently reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.counter(STATUS_OFFSET).load(Ordering::Acquire) & STATUS_CONNECTED != 0
    }

    /// Live value of the session-info update counter.
    pub fn session_info_update(&self) -> i32 {
        self.counter(SESSION_INFO_UPDATE_OFFSET).load(Ordering::Acquire)
    }

    /// Copy the raw session document.
    ///
    /// The text is copied between two loads of the update counter and recopied when the
    /// counter moved, at most `max_retries` extra times. Returns `None` when the header
    /// reserves no session-info range.
    pub fn session_info_text(&self, max_retries: u32) -> Result<Option<SessionInfoText>> {
        let Some(range) = self.header.session_info_range() else {
            return Ok(None);
        };

        let update = self.counter(SESSION_INFO_UPDATE_OFFSET);
        let mut bytes = vec![0u8; range.len()];
        let attempts = max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let before = update.load(Ordering::Acquire);
            // SAFETY: range was validated against the region length by the header parser.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.base.as_ptr().add(range.start),
                    bytes.as_mut_ptr(),
                    bytes.len(),
                )
            };
            fence(Ordering::Acquire);
            let after = update.load(Ordering::Relaxed);

            if before == after {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let text = String::from_utf8_lossy(&bytes[..end]).into_owned();
                trace!(update = before, len = text.len(), "Copied session info");
                return Ok(Some(SessionInfoText { update: before, text }));
            }

            debug!(attempt, before, after, "Session info changed during copy");
        }

        warn!(attempts, "Session info never stable across a copy");
        Err(TelemetryError::InconsistentSnapshot { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;
    use crate::test_utils::RegionBuilder;

    #[test]
    fn store_exposes_parsed_header_and_counters() {
        let (store, mut publisher) = RegionBuilder::new()
            .with_variable("Speed", VariableType::Float, 1)
            .with_buffer_count(3)
            .build()
            .into_store()
            .unwrap();

        assert_eq!(store.header().buffer_count(), 3);
        assert_eq!(store.tick_count(0), Some(0));
        assert_eq!(store.tick_count(3), None);

        let (slot, tick) = publisher.publish_with(|bytes| bytes[..4].copy_from_slice(&1.0f32.to_le_bytes()));
        assert_eq!(store.tick_count(slot), Some(tick));

        let mut copy = vec![0u8; store.header().buffer_length()];
        store.copy_slot(slot, &mut copy);
        assert_eq!(&copy[..4], &1.0f32.to_le_bytes());
    }

    #[test]
    fn connected_bit_is_read_live() {
        let (store, publisher) = RegionBuilder::new().build().into_store().unwrap();
        assert!(store.is_connected());

        publisher.set_connected(false);
        assert!(!store.is_connected());
        publisher.set_connected(true);
        assert!(store.is_connected());
    }

    #[test]
    fn session_info_text_stops_at_nul_and_tracks_updates() {
        let (store, publisher) = RegionBuilder::new()
            .with_session_info("WeekendInfo:\n TrackName: monza\n")
            .build()
            .into_store()
            .unwrap();

        let first = store.session_info_text(4).unwrap().unwrap();
        assert_eq!(first.text, "WeekendInfo:\n TrackName: monza\n");

        publisher.set_session_info("WeekendInfo:\n TrackName: spa\n");
        let second = store.session_info_text(4).unwrap().unwrap();
        assert_eq!(second.text, "WeekendInfo:\n TrackName: spa\n");
        assert_ne!(second.update, first.update);
        assert_eq!(store.session_info_update(), second.update);
    }

    #[test]
    fn region_without_session_info_returns_none() {
        let (store, _publisher) = RegionBuilder::new().build().into_store().unwrap();
        assert!(store.session_info_text(0).unwrap().is_none());
    }

    #[test]
    fn malformed_region_is_rejected_at_open() {
        let region = RegionBuilder::new().with_version(1).build();
        assert!(matches!(
            region.into_store(),
            Err(TelemetryError::UnsupportedVersion { found: 1, .. })
        ));
    }
}
