//! Owned handle to a target process.

use crate::arch::{self, Arch};
use crate::error::{InjectError, Result};
use crate::snapshot;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use windows::Win32::Foundation::{CloseHandle, ERROR_ACCESS_DENIED, FALSE, HANDLE};
use windows::Win32::System::Threading::{
    GetCurrentProcessId, OpenProcess, PROCESS_CREATE_THREAD, PROCESS_NAME_WIN32,
    PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
    QueryFullProcessImageNameW,
};
use windows_strings::PWSTR;

/// A running process we hold query + memory + thread-creation rights over.
///
/// The handle is released exactly once on drop. Derived attributes
/// (architecture, image path, parent) are queried per call and never cached,
/// since the target can change underneath us.
pub struct Process {
    handle: HANDLE,
    pid: u32,
}

impl Process {
    /// Open a process by pid. `pid == -1` opens the calling process itself
    /// (through its real pid, so the handle closes like any other).
    pub fn open(pid: i32) -> Result<Self> {
        // exactly -1 means "the calling process"; any other negative pid is
        // just an id that cannot exist
        let real_pid = if pid == -1 {
            unsafe { GetCurrentProcessId() }
        } else {
            pid as u32
        };

        let rights = PROCESS_QUERY_INFORMATION
            | PROCESS_CREATE_THREAD
            | PROCESS_VM_OPERATION
            | PROCESS_VM_READ
            | PROCESS_VM_WRITE;

        let handle = unsafe { OpenProcess(rights, FALSE.into(), real_pid) }.map_err(|e| {
            if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                InjectError::AccessDenied { pid, source: e }
            } else {
                InjectError::NoSuchProcess { pid, source: e }
            }
        })?;

        Ok(Self {
            handle,
            pid: real_pid,
        })
    }

    /// Open the calling process.
    pub fn current() -> Result<Self> {
        Self::open(-1)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn handle(&self) -> HANDLE {
        self.handle
    }

    /// Full path of the target's executable image.
    ///
    /// Fails when the path cannot be resolved anymore, e.g. the process
    /// exited between `open` and this query.
    pub fn file_name(&self) -> Result<PathBuf> {
        let mut buf = [0u16; 1024];
        let mut len = buf.len() as u32;
        unsafe {
            QueryFullProcessImageNameW(
                self.handle,
                PROCESS_NAME_WIN32,
                PWSTR(buf.as_mut_ptr()),
                &mut len,
            )
        }
        .map_err(|e| InjectError::Win32 {
            context: "QueryFullProcessImageNameW",
            source: e,
        })?;
        Ok(PathBuf::from(std::ffi::OsString::from_wide(
            &buf[..len as usize],
        )))
    }

    /// Instruction-set width of the target. Returns [`Arch::Unknown`] when
    /// the probe is inconclusive; never an error.
    pub fn architecture(&self) -> Arch {
        arch::probe(self.handle)
    }

    /// Pid of the parent process, or `None` when the parent is gone.
    /// A vanished parent is normal, not an error.
    pub fn parent_pid(&self) -> Option<u32> {
        snapshot::parent_of(self.pid)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            unsafe { CloseHandle(self.handle) }.ok();
        }
    }
}

// SAFETY: the handle is a kernel object reference, valid from any thread
unsafe impl Send for Process {}
unsafe impl Sync for Process {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_current_by_sentinel_pid() {
        let process = Process::open(-1).unwrap();
        assert_eq!(process.pid(), unsafe { GetCurrentProcessId() });
    }

    #[test]
    fn file_name_of_current_process() {
        let process = Process::current().unwrap();
        let path = process.file_name().unwrap();
        assert!(path.extension().is_some_and(|e| e.eq_ignore_ascii_case("exe")));
    }

    #[test]
    fn parent_of_current_process_does_not_panic() {
        let process = Process::current().unwrap();
        // the parent may already be gone; either answer is fine
        let _ = process.parent_pid();
    }

    #[test]
    fn only_minus_one_is_the_self_sentinel() {
        let err = Process::open(-2).unwrap_err();
        assert!(matches!(err, InjectError::NoSuchProcess { pid: -2, .. }));
    }

    #[test]
    fn open_nonexistent_pid_is_no_such_process() {
        // pids are multiples of 4 well below this; nothing to open here
        let err = Process::open(2_000_000_001).unwrap_err();
        assert!(matches!(err, InjectError::NoSuchProcess { .. }));
    }
}
