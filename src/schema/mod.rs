//! Header Parsing & Binary Layout
//!
//! This module turns the raw bytes at the start of a shared snapshot store into a
//! validated [`ConnectionHeader`].
//!
//! # Architecture
//!
//! - `header` decodes the fixed `irsdk_header`, validates the buffer slot ranges and the
//!   session-info range, and owns the name → descriptor index
//! - `variables` decodes and validates the 144-byte `irsdk_varHeader` records
//!
//! Nothing in this module touches live memory. Callers copy the header prefix out of the
//! mapped region first, so parsing is a pure function of a byte slice and the region
//! length.

pub mod header;
pub mod variables;

pub use header::{
    ConnectionHeader, ContentVersion, HEADER_SIZE, MAX_BUFFERS, STATUS_CONNECTED,
    SUPPORTED_VERSION, tick_count_offset,
};
pub use variables::VAR_HEADER_SIZE;
