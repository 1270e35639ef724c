//! Synthetic shared-memory regions for tests and benchmarks
//!
//! [`RegionBuilder`] lays out a complete region image (fixed header, variable table,
//! session info and buffer slots) the same way the simulator does, and
//! [`SyntheticRegion::into_store`] maps it into an aligned allocation so that a
//! [`SharedStore`] can be opened over it. The returned [`SyntheticPublisher`] then plays
//! the simulator's part of the sequence-lock protocol.

#![cfg(any(test, feature = "benchmark"))]

use std::ops::Range;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering, fence};

use crate::memory::{InProcessSignal, SharedStore};
use crate::schema::header::{
    BUF_LEN_OFFSET, NUM_BUF_OFFSET, NUM_VARS_OFFSET, SESSION_INFO_LEN_OFFSET,
    SESSION_INFO_OFFSET_OFFSET, SESSION_INFO_UPDATE_OFFSET, STATUS_OFFSET, TICK_RATE_OFFSET,
    VAR_HEADER_OFFSET_OFFSET, VERSION_OFFSET,
};
use crate::schema::variables::{MAX_DESC, MAX_STRING};
use crate::schema::{HEADER_SIZE, STATUS_CONNECTED, SUPPORTED_VERSION, VAR_HEADER_SIZE, tick_count_offset};
use crate::{Result, VariableDescriptor, VariableType};

const ALIGN: usize = 16;

fn align_up(value: usize) -> usize {
    value.div_ceil(ALIGN) * ALIGN
}

/// Encode one 144-byte variable record.
pub fn encode_var_record(
    name: &str,
    type_code: i32,
    offset: i32,
    count: i32,
    count_as_time: bool,
    description: &str,
    unit: &str,
) -> Vec<u8> {
    let mut record = vec![0u8; VAR_HEADER_SIZE];
    record[0..4].copy_from_slice(&type_code.to_le_bytes());
    record[4..8].copy_from_slice(&offset.to_le_bytes());
    record[8..12].copy_from_slice(&count.to_le_bytes());
    record[12] = count_as_time as u8;
    write_c_string(&mut record[16..16 + MAX_STRING], name);
    write_c_string(&mut record[48..48 + MAX_DESC], description);
    write_c_string(&mut record[112..112 + MAX_STRING], unit);
    record
}

fn write_c_string(field: &mut [u8], text: &str) {
    let len = text.len().min(field.len() - 1);
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
}

/// Where everything ended up in a built region.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    pub buffer_offsets: Vec<usize>,
    pub buffer_length: usize,
    pub variables: Vec<VariableDescriptor>,
    pub variable_table: Range<usize>,
    pub session_info: Option<Range<usize>>,
}

/// Builder for well-formed region images.
#[derive(Debug, Clone)]
pub struct RegionBuilder {
    version: i32,
    tick_rate: i32,
    buffer_count: usize,
    buffer_length: Option<usize>,
    variables: Vec<(String, VariableType, usize)>,
    session_info: Option<String>,
    padding: usize,
}

impl Default for RegionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            tick_rate: 60,
            buffer_count: 3,
            buffer_length: None,
            variables: Vec::new(),
            session_info: None,
            padding: 0,
        }
    }

    /// Append a variable; variables are packed in insertion order.
    pub fn with_variable(mut self, name: &str, value_type: VariableType, count: usize) -> Self {
        self.variables.push((name.to_string(), value_type, count));
        self
    }

    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count;
        self
    }

    /// Override the computed buffer length.
    pub fn with_buffer_length(mut self, len: usize) -> Self {
        self.buffer_length = Some(len);
        self
    }

    pub fn with_session_info(mut self, text: &str) -> Self {
        self.session_info = Some(text.to_string());
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Extra unused bytes at the end of the region.
    pub fn with_padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn build(self) -> SyntheticRegion {
        let mut variables = Vec::with_capacity(self.variables.len());
        let mut cursor = 0;
        for (name, value_type, count) in &self.variables {
            variables.push(VariableDescriptor {
                name: name.clone(),
                value_type: *value_type,
                value_count: *count,
                byte_offset: cursor,
                count_as_time: false,
                description: format!("{name} value"),
                unit: String::new(),
            });
            cursor += value_type.size() * count;
        }
        let buffer_length = self.buffer_length.unwrap_or_else(|| align_up(cursor.max(1)));

        let variable_table = HEADER_SIZE..HEADER_SIZE + variables.len() * VAR_HEADER_SIZE;
        let mut end = align_up(variable_table.end);

        // Reserve room so the session text can later be replaced by a longer one.
        let session_info = self.session_info.as_ref().map(|text| {
            let range = end..end + align_up(text.len() + 1).max(1024);
            end = range.end;
            range
        });

        let buffer_offsets: Vec<usize> = (0..self.buffer_count)
            .map(|_| {
                let offset = end;
                end = align_up(end + buffer_length);
                offset
            })
            .collect();

        let mut bytes = vec![0u8; end + self.padding];
        let mut put = |offset: usize, value: i32| {
            bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes())
        };
        put(VERSION_OFFSET, self.version);
        put(STATUS_OFFSET, STATUS_CONNECTED);
        put(TICK_RATE_OFFSET, self.tick_rate);
        put(SESSION_INFO_UPDATE_OFFSET, 1);
        put(SESSION_INFO_LEN_OFFSET, session_info.as_ref().map_or(0, |r| r.len() as i32));
        put(SESSION_INFO_OFFSET_OFFSET, session_info.as_ref().map_or(0, |r| r.start as i32));
        put(NUM_VARS_OFFSET, variables.len() as i32);
        put(VAR_HEADER_OFFSET_OFFSET, variable_table.start as i32);
        put(NUM_BUF_OFFSET, self.buffer_count as i32);
        put(BUF_LEN_OFFSET, buffer_length as i32);
        for (slot, offset) in buffer_offsets.iter().enumerate() {
            put(tick_count_offset(slot) + 4, *offset as i32);
        }

        for (i, desc) in variables.iter().enumerate() {
            let record = encode_var_record(
                &desc.name,
                desc.value_type.code(),
                desc.byte_offset as i32,
                desc.value_count as i32,
                desc.count_as_time,
                &desc.description,
                &desc.unit,
            );
            let start = variable_table.start + i * VAR_HEADER_SIZE;
            bytes[start..start + VAR_HEADER_SIZE].copy_from_slice(&record);
        }

        if let (Some(range), Some(text)) = (&session_info, &self.session_info) {
            bytes[range.start..range.start + text.len()].copy_from_slice(text.as_bytes());
        }

        SyntheticRegion {
            bytes,
            layout: RegionLayout {
                buffer_offsets,
                buffer_length,
                variables,
                variable_table,
                session_info,
            },
        }
    }
}

/// A built region image that tests may corrupt before parsing.
#[derive(Debug, Clone)]
pub struct SyntheticRegion {
    bytes: Vec<u8>,
    layout: RegionLayout,
}

impl SyntheticRegion {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Overwrite a little-endian i32 at a region offset.
    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_variable_offset(&mut self, index: usize, offset: i32) {
        self.set_i32(self.layout.variable_table.start + index * VAR_HEADER_SIZE + 4, offset);
    }

    pub fn set_variable_count(&mut self, index: usize, count: i32) {
        self.set_i32(self.layout.variable_table.start + index * VAR_HEADER_SIZE + 8, count);
    }

    pub fn set_buffer_offset(&mut self, slot: usize, offset: i32) {
        self.set_i32(tick_count_offset(slot) + 4, offset);
    }

    /// Map the image into shared memory and open a store over it.
    pub fn into_store(self) -> Result<(Arc<SharedStore>, SyntheticPublisher)> {
        let memory = Arc::new(SyntheticMemory::from_bytes(&self.bytes));
        let guard: Box<dyn Send + Sync> = Box::new(Arc::clone(&memory));
        // SAFETY: the allocation is 8-byte aligned, `len` bytes long, and kept alive by
        // the guard for as long as the store exists.
        let store = unsafe { SharedStore::from_raw_parts(memory.base(), memory.len, guard)? };
        let publisher = SyntheticPublisher {
            memory,
            layout: self.layout,
            signal: None,
            next_tick: 2,
            next_slot: 0,
        };
        Ok((Arc::new(store), publisher))
    }
}

/// Heap memory shared between a synthetic publisher and a store.
#[derive(Debug)]
pub struct SyntheticMemory {
    words: NonNull<[u64]>,
    len: usize,
}

// SAFETY: all shared access goes through atomics or raw copies bracketed by the
// sequence-lock protocol.
unsafe impl Send for SyntheticMemory {}
unsafe impl Sync for SyntheticMemory {}

impl SyntheticMemory {
    fn from_bytes(bytes: &[u8]) -> Self {
        let words = vec![0u64; bytes.len().div_ceil(8).max(1)].into_boxed_slice();
        let words = NonNull::from(Box::leak(words));
        // SAFETY: the allocation holds at least bytes.len() bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), words.cast::<u8>().as_ptr(), bytes.len()) };
        Self { words, len: bytes.len() }
    }

    fn base(&self) -> NonNull<u8> {
        self.words.cast::<u8>()
    }

    fn counter(&self, offset: usize) -> &AtomicI32 {
        // SAFETY: callers pass 4-byte aligned offsets inside the fixed header.
        unsafe { AtomicI32::from_ptr(self.base().as_ptr().add(offset).cast::<i32>()) }
    }

    fn write(&self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.len);
        // SAFETY: bounds checked above.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), self.base().as_ptr().add(offset), data.len()) };
    }
}

impl Drop for SyntheticMemory {
    fn drop(&mut self) {
        // SAFETY: `words` came from Box::leak in from_bytes and is dropped once.
        unsafe { drop(Box::from_raw(self.words.as_ptr())) };
    }
}

/// Plays the simulator's side of the protocol against a synthetic region.
///
/// Slots are written round-robin. Completed ticks are even and advance by two; while a
/// slot is being written its counter holds the preceding odd value.
#[derive(Debug)]
pub struct SyntheticPublisher {
    memory: Arc<SyntheticMemory>,
    layout: RegionLayout,
    signal: Option<Arc<InProcessSignal>>,
    next_tick: i32,
    next_slot: usize,
}

impl SyntheticPublisher {
    /// Pulse `signal` after every publication.
    pub fn with_signal(mut self, signal: Arc<InProcessSignal>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Start writing the next slot: its counter goes odd. Returns the slot index.
    pub fn begin_write(&mut self) -> usize {
        let slot = self.next_slot;
        let tick = self.next_tick;
        self.memory.counter(tick_count_offset(slot)).store(tick.wrapping_sub(1), Ordering::Relaxed);
        fence(Ordering::Release);
        slot
    }

    fn finish_write(&mut self, slot: usize) -> i32 {
        let tick = self.next_tick;
        self.memory.counter(tick_count_offset(slot)).store(tick, Ordering::Release);
        self.next_tick = match tick.wrapping_add(2) {
            0 => 2,
            next => next,
        };
        self.next_slot = (slot + 1) % self.layout.buffer_offsets.len();
        if let Some(signal) = &self.signal {
            signal.notify();
        }
        tick
    }

    /// Publish one snapshot whose payload is produced by `fill`.
    pub fn publish_with(&mut self, fill: impl FnOnce(&mut [u8])) -> (usize, i32) {
        let mut payload = vec![0u8; self.layout.buffer_length];
        fill(&mut payload);

        let slot = self.begin_write();
        self.memory.write(self.layout.buffer_offsets[slot], &payload);
        let tick = self.finish_write(slot);
        (slot, tick)
    }

    /// Publish a payload filled entirely with `byte`.
    pub fn publish_pattern(&mut self, byte: u8) -> (usize, i32) {
        self.publish_with(|payload| payload.fill(byte))
    }

    /// Start the next write from `tick`, to exercise counter wrap-around.
    pub fn set_next_tick(&mut self, tick: i32) {
        self.next_tick = tick & !1;
    }

    pub fn set_connected(&self, connected: bool) {
        let status = if connected { STATUS_CONNECTED } else { 0 };
        self.memory.counter(STATUS_OFFSET).store(status, Ordering::Release);
    }

    /// Replace the session document and bump its update counter.
    pub fn set_session_info(&self, text: &str) {
        let Some(range) = &self.layout.session_info else {
            return;
        };
        let mut bytes = vec![0u8; range.len()];
        let len = text.len().min(range.len() - 1);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        self.memory.write(range.start, &bytes);
        self.memory.counter(SESSION_INFO_UPDATE_OFFSET).fetch_add(1, Ordering::Release);
    }
}
