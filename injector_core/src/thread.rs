//! One-shot threads created inside the target process.

use crate::error::{InjectError, Result};
use crate::process::Process;
use std::ffi::c_void;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::System::Threading::{
    CreateRemoteThread, GetExitCodeThread, INFINITE, WaitForSingleObject,
};

/// A thread spawned in the target to run one entry point against one
/// argument. Created, joined, read, closed; never reused across calls.
pub(crate) struct RemoteThread {
    handle: HANDLE,
}

impl RemoteThread {
    /// Start `entry` in the target with `param` as its sole argument.
    ///
    /// `entry` must be a thread-start shaped routine inside the target:
    /// one pointer-sized argument in, one 32-bit exit code out.
    pub(crate) fn spawn(process: &Process, entry: usize, param: usize) -> Result<Self> {
        // SAFETY: entry is only ever dereferenced inside the target process;
        // here it is just a pointer-sized value for CreateRemoteThread
        let start: unsafe extern "system" fn(*mut c_void) -> u32 =
            unsafe { std::mem::transmute(entry) };
        let handle = unsafe {
            CreateRemoteThread(
                process.handle(),
                None,
                0,
                Some(start),
                Some(param as *const c_void),
                0,
                None,
            )
        }
        .map_err(|e| InjectError::RemoteThreadCreateFailed { source: e })?;
        Ok(Self { handle })
    }

    /// Block until the thread finishes and return its exit code.
    ///
    /// No timeout: an unresponsive target blocks us indefinitely. Callers
    /// needing bounded waits apply them a layer up.
    pub(crate) fn join(&self) -> Result<u32> {
        let wait = unsafe { WaitForSingleObject(self.handle, INFINITE) };
        if wait != WAIT_OBJECT_0 {
            return Err(InjectError::last_error("WaitForSingleObject"));
        }
        let mut exit_code = 0u32;
        unsafe { GetExitCodeThread(self.handle, &mut exit_code) }.map_err(|e| {
            InjectError::Win32 {
                context: "GetExitCodeThread",
                source: e,
            }
        })?;
        Ok(exit_code)
    }
}

impl Drop for RemoteThread {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            unsafe { CloseHandle(self.handle) }.ok();
        }
    }
}
