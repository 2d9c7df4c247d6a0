//! `CF_HDROP` clipboard provider.
//!
//! Ownership of the global memory block:
//! * until `SetClipboardData` succeeds it belongs to us and is freed by
//!   [`GlobalBuffer`]'s `Drop` on every early return;
//! * after `SetClipboardData` succeeds the OS owns it and we must never free it,
//!   so the guard is consumed with [`GlobalBuffer::into_raw`].

use crate::file_drop::build_file_drop_payload;
use crate::{ClipboardError, ClipboardProvider};
use std::path::Path;
use std::ptr;
use tracing::debug;
use windows_sys::Win32::Foundation::{GlobalFree, HGLOBAL};
use windows_sys::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData,
};
use windows_sys::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};
use windows_sys::Win32::System::Ole::CF_HDROP;

#[derive(Debug, Default)]
pub struct FileDropClipboard;

impl ClipboardProvider for FileDropClipboard {
    fn name(&self) -> &'static str {
        "file-drop"
    }

    fn copy_file(&self, path: &Path) -> Result<(), ClipboardError> {
        let payload = build_file_drop_payload(&[path]);
        let buffer = GlobalBuffer::with_bytes(&payload)?;
        let _open = OpenClipboardGuard::open()?;

        // SAFETY: the clipboard is open on this thread.
        if unsafe { EmptyClipboard() } == 0 {
            return Err(last_error("EmptyClipboard"));
        }
        // SAFETY: `buffer` holds an unlocked movable allocation in the CF_HDROP layout.
        let handed = unsafe { SetClipboardData(CF_HDROP as u32, buffer.as_raw()) };
        if handed.is_null() {
            return Err(last_error("SetClipboardData"));
        }
        let _ = buffer.into_raw();
        debug!(path = %path.display(), bytes = payload.len(), "file drop handed to clipboard");
        Ok(())
    }
}

/// Movable global allocation freed on drop unless released with `into_raw`.
struct GlobalBuffer(HGLOBAL);

impl GlobalBuffer {
    fn with_bytes(bytes: &[u8]) -> Result<Self, ClipboardError> {
        // SAFETY: plain allocation call; null is checked below.
        let handle = unsafe { GlobalAlloc(GMEM_MOVEABLE, bytes.len()) };
        if handle.is_null() {
            return Err(last_error("GlobalAlloc"));
        }
        let buffer = Self(handle);

        // SAFETY: `handle` is a live allocation of `bytes.len()` bytes owned by `buffer`.
        unsafe {
            let dst = GlobalLock(handle) as *mut u8;
            if dst.is_null() {
                return Err(last_error("GlobalLock"));
            }
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            GlobalUnlock(handle);
        }
        Ok(buffer)
    }

    fn as_raw(&self) -> HGLOBAL {
        self.0
    }

    fn into_raw(self) -> HGLOBAL {
        let handle = self.0;
        std::mem::forget(self);
        handle
    }
}

impl Drop for GlobalBuffer {
    fn drop(&mut self) {
        // SAFETY: still owned by us; ownership transfer goes through `into_raw`.
        unsafe {
            GlobalFree(self.0);
        }
    }
}

struct OpenClipboardGuard;

impl OpenClipboardGuard {
    fn open() -> Result<Self, ClipboardError> {
        // SAFETY: a null owner window associates the clipboard with the current task.
        if unsafe { OpenClipboard(ptr::null_mut()) } == 0 {
            return Err(last_error("OpenClipboard"));
        }
        Ok(Self)
    }
}

impl Drop for OpenClipboardGuard {
    fn drop(&mut self) {
        // SAFETY: only constructed after a successful OpenClipboard.
        unsafe {
            CloseClipboard();
        }
    }
}

fn last_error(call: &str) -> ClipboardError {
    ClipboardError::Backend(format!("{call}: {}", std::io::Error::last_os_error()))
}
