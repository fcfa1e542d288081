//! Short-lived memory allocations inside the target's address space.

use crate::error::{InjectError, Result};
use crate::process::Process;
use std::ffi::c_void;
use windows::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER;
use windows::Win32::System::Diagnostics::Debug::WriteProcessMemory;
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE, VirtualAllocEx, VirtualFreeEx,
};

/// A block of memory committed inside the target, owned by one remote call.
///
/// Allocated immediately before a payload write and freed as soon as the call
/// finishes; dropping the region frees it too, so failure paths leak nothing.
/// The base address means nothing outside the allocate..free window.
pub(crate) struct RemoteRegion<'a> {
    process: &'a Process,
    base: *mut c_void,
    size: usize,
}

impl<'a> RemoteRegion<'a> {
    /// Commit `size` bytes of RWX-capable memory in the target.
    pub(crate) fn allocate(process: &'a Process, size: usize) -> Result<Self> {
        let base = unsafe {
            VirtualAllocEx(
                process.handle(),
                None,
                size,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_EXECUTE_READWRITE,
            )
        };
        if base.is_null() {
            return Err(InjectError::RemoteAllocFailed {
                size,
                source: windows::core::Error::from_win32(),
            });
        }
        Ok(Self {
            process,
            base,
            size,
        })
    }

    pub(crate) fn base(&self) -> usize {
        self.base as usize
    }

    /// Copy `bytes` into the target at `base + offset`.
    pub(crate) fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let address = self.base as usize + offset;
        if offset + bytes.len() > self.size {
            // rejected locally, so don't pick up whatever stale last-error
            // the thread happens to carry
            return Err(InjectError::RemoteWriteFailed {
                address,
                size: bytes.len(),
                source: windows::core::Error::new(
                    ERROR_INSUFFICIENT_BUFFER.to_hresult(),
                    "write exceeds the allocated region",
                ),
            });
        }
        unsafe {
            WriteProcessMemory(
                self.process.handle(),
                address as *const c_void,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                None,
            )
        }
        .map_err(|e| InjectError::RemoteWriteFailed {
            address,
            size: bytes.len(),
            source: e,
        })
    }

    /// Release the allocation. Idempotent: freeing twice, or dropping after an
    /// explicit free, performs exactly one OS-level deallocation.
    pub(crate) fn free(&mut self) {
        if self.base.is_null() {
            return;
        }
        if let Err(e) = unsafe { VirtualFreeEx(self.process.handle(), self.base, 0, MEM_RELEASE) } {
            // the target may have exited underneath us; nothing left to leak
            log::warn!("VirtualFreeEx at {:#x} failed: {e}", self.base as usize);
        }
        self.base = std::ptr::null_mut();
    }
}

impl Drop for RemoteRegion<'_> {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_write_free_in_self() {
        let process = Process::current().unwrap();
        let mut region = RemoteRegion::allocate(&process, 64).unwrap();
        assert_ne!(region.base(), 0);
        region.write(0, &[1, 2, 3, 4]).unwrap();
        region.write(60, &[5, 6, 7, 8]).unwrap();
        region.free();
    }

    #[test]
    fn double_free_is_a_noop() {
        let process = Process::current().unwrap();
        let mut region = RemoteRegion::allocate(&process, 16).unwrap();
        region.free();
        region.free();
        // drop performs a third free() call; still nothing to deallocate
    }

    #[test]
    fn write_past_end_is_rejected() {
        let process = Process::current().unwrap();
        let region = RemoteRegion::allocate(&process, 8).unwrap();
        let err = region.write(4, &[0u8; 8]).unwrap_err();
        match err {
            InjectError::RemoteWriteFailed { source, .. } => {
                assert_eq!(source.code(), ERROR_INSUFFICIENT_BUFFER.to_hresult());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_write_still_frees_exactly_once() {
        let process = Process::current().unwrap();
        let mut region = RemoteRegion::allocate(&process, 8).unwrap();
        region.write(4, &[0u8; 8]).unwrap_err();
        // after the error the region must still release cleanly: one real
        // deallocation, base zeroed, further frees and the drop are no-ops
        region.free();
        assert_eq!(region.base(), 0);
        region.free();
    }
}
