//! Named shared memory and readiness event
//!
//! Opens the simulator's read-only file mapping and its data-valid event. The mapped
//! view is handed to [`SharedStore`], which owns it from then on; nothing here reads
//! header fields directly.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::time::Duration;

use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
    OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use windows::Win32::System::Threading::{
    OpenEventW, SYNCHRONIZATION_ACCESS_RIGHTS, WaitForSingleObject,
};
use windows::core::PCWSTR;

use super::wide_string;
use crate::memory::{ReadySignal, SharedStore, WaitResult};
use crate::{Result, TelemetryError};

/// SYNCHRONIZE access right
const SYNCHRONIZE: SYNCHRONIZATION_ACCESS_RIGHTS = SYNCHRONIZATION_ACCESS_RIGHTS(0x0010_0000);

/// A mapped view and the mapping handle behind it. Unmapped on drop.
struct MappedView {
    mapping: HANDLE,
    base: NonNull<u8>,
}

// SAFETY: the view is read-only and process-wide; handles may be closed from any thread.
unsafe impl Send for MappedView {}
unsafe impl Sync for MappedView {}

impl Drop for MappedView {
    fn drop(&mut self) {
        trace!("Unmapping shared memory view");
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut c_void };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

/// Map the named shared memory region and validate its header.
pub fn open_shared_store(name: &str) -> Result<SharedStore> {
    trace!(name, "Opening shared memory mapping");

    let wide_name = wide_string(name);
    let mapping = unsafe {
        OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
            .map_err(|e| TelemetryError::windows_api_error("OpenFileMappingW", e))?
    };

    let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0) };
    let Some(base) = NonNull::new(view.Value as *mut u8) else {
        let win_err = windows::core::Error::from_thread();
        unsafe {
            let _ = CloseHandle(mapping);
        }
        return Err(TelemetryError::windows_api_error("MapViewOfFile", win_err));
    };
    let guard = MappedView { mapping, base };

    let mut info = MEMORY_BASIC_INFORMATION::default();
    let written = unsafe {
        VirtualQuery(
            Some(base.as_ptr() as *const c_void),
            &mut info,
            std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };
    if written == 0 {
        let win_err = windows::core::Error::from_thread();
        return Err(TelemetryError::windows_api_error("VirtualQuery", win_err));
    }
    let len = info.RegionSize;
    debug!(name, len, "Mapped shared memory view");

    // SAFETY: the view spans `len` readable, page-aligned bytes and stays mapped until
    // `guard` drops, which the store owns.
    unsafe { SharedStore::from_raw_parts(base, len, Box::new(guard)) }
}

/// The publisher's named data-valid event.
#[derive(Debug)]
pub struct NamedEventSignal {
    event: HANDLE,
}

// SAFETY: event handles are kernel objects usable from any thread.
unsafe impl Send for NamedEventSignal {}
unsafe impl Sync for NamedEventSignal {}

impl NamedEventSignal {
    pub fn open(name: &str) -> Result<Self> {
        let wide_name = wide_string(name);
        let event = unsafe {
            OpenEventW(SYNCHRONIZE, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| TelemetryError::windows_api_error("OpenEventW", e))?
        };
        debug!(name, "Opened readiness event");
        Ok(Self { event })
    }
}

impl ReadySignal for NamedEventSignal {
    fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let ms = timeout.as_millis().min(u32::MAX as u128 - 1) as u32;
        trace!(timeout_ms = ms, "Waiting for readiness event");

        match unsafe { WaitForSingleObject(self.event, ms) } {
            WAIT_OBJECT_0 => Ok(WaitResult::Signaled),
            WAIT_TIMEOUT => Ok(WaitResult::Timeout),
            _ => {
                let win_err = windows::core::Error::from_thread();
                Err(TelemetryError::windows_api_error("WaitForSingleObject", win_err))
            }
        }
    }
}

impl Drop for NamedEventSignal {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.event);
        }
    }
}
