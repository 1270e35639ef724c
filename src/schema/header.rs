//! Shared Memory Header Parsing
//!
//! This module parses and validates the simulator's `irsdk_header` structure together
//! with the variable table it points to. The result, [`ConnectionHeader`], is the single
//! trust boundary between simulator-authored memory and every typed access above it.
//!
//! # Header Layout
//!
//! The header follows the C structure layout from the simulator SDK:
//! ```c
//! typedef struct irsdk_header
//! {
//!     int ver;                    // api version, 2 for current clients
//!     int status;                 // bitfield for status
//!     int tickRate;               // ticks per second (60hz)
//!     int sessionInfoUpdate;      // incremented when session info changes
//!     int sessionInfoLen;         // length in bytes of session info string
//!     int sessionInfoOffset;      // offset to session info string
//!     int numVars;                // length of irsdk_varHeader array
//!     int varHeaderOffset;        // offset to irsdk_varHeader[0]
//!     int numBuf;                 // num of buffers (<= 4)
//!     int bufLen;                 // length in bytes for each buffer
//!     int pad1[2];                // 16-byte alignment
//!     irsdk_varBuf varBuf[4];     // buffers
//! } irsdk_header;
//! ```
//!
//! - Header size: 112 bytes (40 bytes of fields, 8 bytes padding, 4 × 16-byte buffer entries)
//! - Each `varBuf` is `{ int tickCount; int bufOffset; int pad[2]; }`
//! - Regions larger than the fixed header are tolerated; trailing fields are ignored
//!
//! Fields are decoded with explicit little-endian reads rather than by casting the
//! mapped memory to a struct, so untrusted bytes never become a Rust reference.
//!
//! # Validation
//!
//! Parsing is pure and exhaustive. Every invariant failure is reported as a distinct
//! [`HeaderViolation`]:
//!
//! - version must be exactly [`SUPPORTED_VERSION`]; an all-zero header is "uninitialised"
//! - buffer count in `1..=4`, buffer length positive, no negative offsets or lengths
//! - every buffer slot inside the region and disjoint from the fixed header, the
//!   variable table, the session info and every other slot
//! - variable names non-empty and unique, type codes known, counts positive
//! - every variable inside the buffer length, variable ranges pairwise disjoint

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::variables::{VAR_HEADER_SIZE, VarRecord, i32_at};
use crate::error::HeaderViolation;
use crate::{Result, TelemetryError, VarData, Variable, VariableDescriptor};

/// Size of the fixed `irsdk_header` structure.
pub const HEADER_SIZE: usize = 112;
/// Maximum number of rotating buffer slots.
pub const MAX_BUFFERS: usize = 4;
/// The only header version this reader interprets.
pub const SUPPORTED_VERSION: i32 = 2;
/// Status bit set while the simulator is publishing.
pub const STATUS_CONNECTED: i32 = 0x1;

pub(crate) const VERSION_OFFSET: usize = 0;
pub(crate) const STATUS_OFFSET: usize = 4;
pub(crate) const TICK_RATE_OFFSET: usize = 8;
pub(crate) const SESSION_INFO_UPDATE_OFFSET: usize = 12;
pub(crate) const SESSION_INFO_LEN_OFFSET: usize = 16;
pub(crate) const SESSION_INFO_OFFSET_OFFSET: usize = 20;
pub(crate) const NUM_VARS_OFFSET: usize = 24;
pub(crate) const VAR_HEADER_OFFSET_OFFSET: usize = 28;
pub(crate) const NUM_BUF_OFFSET: usize = 32;
pub(crate) const BUF_LEN_OFFSET: usize = 36;
pub(crate) const VAR_BUF_OFFSET: usize = 48;
pub(crate) const VAR_BUF_STRIDE: usize = 16;

/// Byte offset of slot `slot`'s tick counter within the region.
pub const fn tick_count_offset(slot: usize) -> usize {
    VAR_BUF_OFFSET + slot * VAR_BUF_STRIDE
}

const fn buf_offset_offset(slot: usize) -> usize {
    tick_count_offset(slot) + 4
}

/// Opaque ordered token identifying the header shape that produced a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentVersion(pub i32);

impl fmt::Display for ContentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Validated header of a shared snapshot store.
///
/// Read once when a connection is established. Subsequent reads only touch buffer
/// payload bytes and the live counters, never the parsed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHeader {
    content_version: ContentVersion,
    tick_rate: i32,
    buffer_length: usize,
    buffer_offsets: Vec<usize>,
    variables: Vec<VariableDescriptor>,
    index: HashMap<String, usize>,
    variable_table: Range<usize>,
    session_info: Option<Range<usize>>,
    region_len: usize,
}

impl ConnectionHeader {
    /// Parse a complete region image.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_with_region(raw, raw.len())
    }

    /// Parse a prefix of a region whose full mapped length is `region_len`.
    ///
    /// `raw` must contain at least the fixed header and the variable table; buffer and
    /// session-info ranges are checked against `region_len` without being read.
    pub fn parse_with_region(raw: &[u8], region_len: usize) -> Result<Self> {
        trace!(raw_len = raw.len(), region_len, "Parsing connection header");
        let region_len = region_len.max(raw.len());

        if raw.len() < HEADER_SIZE {
            return Err(HeaderViolation::TooShort { len: raw.len(), required: HEADER_SIZE }.into());
        }

        let fixed = &raw[..HEADER_SIZE];
        if fixed.iter().all(|&b| b == 0) {
            return Err(HeaderViolation::Uninitialized.into());
        }

        let version = i32_at(fixed, VERSION_OFFSET);
        if version != SUPPORTED_VERSION {
            return Err(TelemetryError::UnsupportedVersion {
                found: version,
                min_supported: SUPPORTED_VERSION,
                max_supported: SUPPORTED_VERSION,
            });
        }

        let tick_rate = non_negative(fixed, TICK_RATE_OFFSET, "tickRate")?;
        let session_info_len = non_negative(fixed, SESSION_INFO_LEN_OFFSET, "sessionInfoLen")?;
        let session_info_offset =
            non_negative(fixed, SESSION_INFO_OFFSET_OFFSET, "sessionInfoOffset")?;
        let num_vars = non_negative(fixed, NUM_VARS_OFFSET, "numVars")? as usize;
        let var_header_offset =
            non_negative(fixed, VAR_HEADER_OFFSET_OFFSET, "varHeaderOffset")? as usize;

        let num_buf = i32_at(fixed, NUM_BUF_OFFSET);
        if !(1..=MAX_BUFFERS as i32).contains(&num_buf) {
            return Err(HeaderViolation::BufferCount { count: num_buf, max: MAX_BUFFERS }.into());
        }
        let num_buf = num_buf as usize;

        let buf_len = i32_at(fixed, BUF_LEN_OFFSET);
        if buf_len <= 0 {
            return Err(HeaderViolation::BufferLength { len: buf_len }.into());
        }
        let buffer_length = buf_len as usize;

        let variable_table = var_header_offset
            ..num_vars
                .checked_mul(VAR_HEADER_SIZE)
                .and_then(|len| len.checked_add(var_header_offset))
                .unwrap_or(usize::MAX);
        if num_vars > 0 && (variable_table.start < HEADER_SIZE || variable_table.end > region_len)
        {
            return Err(HeaderViolation::VariableTableOutOfBounds {
                start: variable_table.start,
                end: variable_table.end,
                region_len,
            }
            .into());
        }
        if num_vars > 0 && variable_table.end > raw.len() {
            return Err(HeaderViolation::TooShort { len: raw.len(), required: variable_table.end }
                .into());
        }

        let session_info = if session_info_len > 0 {
            let start = session_info_offset as usize;
            let end = start + session_info_len as usize;
            if end > region_len {
                return Err(HeaderViolation::SessionInfoOutOfBounds { start, end, region_len }.into());
            }
            Some(start..end)
        } else {
            None
        };

        let buffer_offsets = parse_buffer_slots(
            fixed,
            num_buf,
            buffer_length,
            region_len,
            (num_vars > 0).then(|| variable_table.clone()),
            session_info.clone(),
        )?;

        let mut variables = Vec::with_capacity(num_vars);
        let mut index = HashMap::with_capacity(num_vars);
        for i in 0..num_vars {
            let start = var_header_offset + i * VAR_HEADER_SIZE;
            let record = VarRecord::parse(&raw[start..start + VAR_HEADER_SIZE]);
            let descriptor = record.into_descriptor(i, buffer_length)?;
            if index.insert(descriptor.name.clone(), i).is_some() {
                return Err(HeaderViolation::DuplicateName { name: descriptor.name }.into());
            }
            variables.push(descriptor);
        }

        check_variable_overlap(&variables)?;

        debug!(
            version,
            tick_rate,
            num_vars,
            num_buf,
            buffer_length,
            has_session_info = session_info.is_some(),
            "Parsed connection header"
        );

        Ok(Self {
            content_version: ContentVersion(version),
            tick_rate,
            buffer_length,
            buffer_offsets,
            variables,
            index,
            variable_table,
            session_info,
            region_len,
        })
    }

    /// Number of bytes of region prefix needed to parse the header.
    ///
    /// Computed from the fixed header alone so callers can copy exactly the fixed header
    /// and variable table out of live memory before calling
    /// [`parse_with_region`](Self::parse_with_region). Returns [`HEADER_SIZE`] when the
    /// table fields are unusable; parsing then reports the precise violation.
    pub fn required_prefix_len(fixed: &[u8]) -> usize {
        if fixed.len() < HEADER_SIZE {
            return HEADER_SIZE;
        }
        let num_vars = i32_at(fixed, NUM_VARS_OFFSET);
        let offset = i32_at(fixed, VAR_HEADER_OFFSET_OFFSET);
        if num_vars <= 0 || offset < 0 {
            return HEADER_SIZE;
        }
        (num_vars as usize)
            .checked_mul(VAR_HEADER_SIZE)
            .and_then(|len| len.checked_add(offset as usize))
            .map_or(HEADER_SIZE, |end| end.max(HEADER_SIZE))
    }

    pub fn content_version(&self) -> ContentVersion {
        self.content_version
    }

    /// Publish rate in Hz.
    pub fn tick_rate(&self) -> i32 {
        self.tick_rate
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_offsets.len()
    }

    /// Length in bytes of every buffer slot, and so of every snapshot.
    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    /// Region offsets of each buffer slot, in slot order.
    pub fn buffer_offsets(&self) -> &[usize] {
        &self.buffer_offsets
    }

    /// Region byte range of buffer slot `slot`.
    pub fn buffer_range(&self, slot: usize) -> Option<Range<usize>> {
        self.buffer_offsets.get(slot).map(|&start| start..start + self.buffer_length)
    }

    /// Variable descriptors in header order.
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Look up a descriptor by exact, case-sensitive name.
    pub fn descriptor(&self, name: &str) -> Option<&VariableDescriptor> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a descriptor, failing with `VariableNotFound`.
    pub fn require(&self, name: &str) -> Result<&VariableDescriptor> {
        self.descriptor(name)
            .ok_or_else(|| TelemetryError::VariableNotFound { name: name.to_string() })
    }

    /// Bind a typed handle, checking representation compatibility once.
    pub fn variable<T: VarData>(&self, name: &str) -> Result<Variable<T>> {
        Variable::bind(self.require(name)?.clone())
    }

    /// Region byte range of the variable table.
    pub fn variable_table_range(&self) -> Range<usize> {
        self.variable_table.clone()
    }

    /// Region byte range reserved for the session document, if any.
    pub fn session_info_range(&self) -> Option<Range<usize>> {
        self.session_info.clone()
    }

    /// Mapped length the header was validated against.
    pub fn region_len(&self) -> usize {
        self.region_len
    }
}

fn non_negative(
    fixed: &[u8],
    offset: usize,
    field: &'static str,
) -> std::result::Result<i32, HeaderViolation> {
    let value = i32_at(fixed, offset);
    if value < 0 { Err(HeaderViolation::NegativeField { field, value }) } else { Ok(value) }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn parse_buffer_slots(
    fixed: &[u8],
    num_buf: usize,
    buffer_length: usize,
    region_len: usize,
    variable_table: Option<Range<usize>>,
    session_info: Option<Range<usize>>,
) -> std::result::Result<Vec<usize>, HeaderViolation> {
    let mut ranges: Vec<Range<usize>> = Vec::with_capacity(num_buf);

    for slot in 0..num_buf {
        let offset = i32_at(fixed, buf_offset_offset(slot));
        if offset < 0 {
            return Err(HeaderViolation::NegativeField { field: "bufOffset", value: offset });
        }
        let range = offset as usize..offset as usize + buffer_length;
        if range.end > region_len {
            return Err(HeaderViolation::BufferOutOfBounds {
                slot,
                start: range.start,
                end: range.end,
                region_len,
            });
        }

        if range.start < HEADER_SIZE {
            return Err(HeaderViolation::BufferOverlap { slot, other: "fixed header".into() });
        }
        if variable_table.as_ref().is_some_and(|table| overlaps(&range, table)) {
            return Err(HeaderViolation::BufferOverlap { slot, other: "variable table".into() });
        }
        if session_info.as_ref().is_some_and(|info| overlaps(&range, info)) {
            return Err(HeaderViolation::BufferOverlap { slot, other: "session info".into() });
        }
        if let Some(other) = ranges.iter().position(|prev| overlaps(&range, prev)) {
            return Err(HeaderViolation::BufferOverlap { slot, other: format!("buffer {other}") });
        }

        ranges.push(range);
    }

    Ok(ranges.into_iter().map(|range| range.start).collect())
}

fn check_variable_overlap(
    variables: &[VariableDescriptor],
) -> std::result::Result<(), HeaderViolation> {
    let mut by_offset: Vec<&VariableDescriptor> = variables.iter().collect();
    by_offset.sort_by_key(|desc| desc.byte_offset);

    for pair in by_offset.windows(2) {
        if pair[0].byte_range().end > pair[1].byte_offset {
            return Err(HeaderViolation::VariableOverlap {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}
