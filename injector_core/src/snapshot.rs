//! Thin wrappers over Toolhelp32 snapshots.
//!
//! Every walk opens a fresh snapshot, iterates, and closes it exactly once;
//! the entries are a point-in-time copy, so callers must tolerate processes,
//! threads and modules disappearing between the walk and any use of the
//! result.

use crate::error::{InjectError, Result};
use std::ffi::OsStr;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CREATE_TOOLHELP_SNAPSHOT_FLAGS, CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW,
    Module32NextW, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS, TH32CS_SNAPTHREAD, THREADENTRY32, Thread32First,
    Thread32Next,
};

struct Snapshot(HANDLE);

impl Snapshot {
    fn new(flags: CREATE_TOOLHELP_SNAPSHOT_FLAGS, pid: u32) -> Result<Self> {
        let handle =
            unsafe { CreateToolhelp32Snapshot(flags, pid) }.map_err(|e| InjectError::Win32 {
                context: "CreateToolhelp32Snapshot",
                source: e,
            })?;
        Ok(Self(handle))
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) }.ok();
    }
}

/// Parent pid of `pid`, if the process still shows up in the process list.
pub(crate) fn parent_of(pid: u32) -> Option<u32> {
    let snap = Snapshot::new(TH32CS_SNAPPROCESS, 0).ok()?;
    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };
    if unsafe { Process32FirstW(snap.0, &mut entry) }.is_ok() {
        loop {
            if entry.th32ProcessID == pid {
                return Some(entry.th32ParentProcessID);
            }
            if unsafe { Process32NextW(snap.0, &mut entry) }.is_err() {
                break;
            }
        }
    }
    None
}

/// Ids of all threads currently owned by `pid`.
pub(crate) fn threads_of(pid: u32) -> Result<Vec<u32>> {
    let snap = Snapshot::new(TH32CS_SNAPTHREAD, 0)?;
    let mut entry = THREADENTRY32 {
        dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
        ..Default::default()
    };
    let mut tids = Vec::new();
    if unsafe { Thread32First(snap.0, &mut entry) }.is_ok() {
        loop {
            if entry.th32OwnerProcessID == pid {
                tids.push(entry.th32ThreadID);
            }
            if unsafe { Thread32Next(snap.0, &mut entry) }.is_err() {
                break;
            }
        }
    }
    Ok(tids)
}

/// Base address of a module loaded in `pid`, matched by file name.
pub(crate) fn module_base(pid: u32, module_name: &OsStr) -> Option<usize> {
    let wanted = module_name.to_string_lossy();
    let snap = Snapshot::new(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid).ok()?;
    let mut entry = MODULEENTRY32W {
        dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
        ..Default::default()
    };
    if unsafe { Module32FirstW(snap.0, &mut entry) }.is_ok() {
        loop {
            let end = entry
                .szModule
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szModule.len());
            let name = String::from_utf16_lossy(&entry.szModule[..end]);
            if name.eq_ignore_ascii_case(&wanted) {
                return Some(entry.modBaseAddr as usize);
            }
            if unsafe { Module32NextW(snap.0, &mut entry) }.is_err() {
                break;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::System::Threading::GetCurrentProcessId;

    #[test]
    fn current_process_has_threads() {
        let tids = threads_of(unsafe { GetCurrentProcessId() }).unwrap();
        assert!(!tids.is_empty());
    }

    #[test]
    fn kernel32_is_loaded_in_current_process() {
        let base = module_base(unsafe { GetCurrentProcessId() }, OsStr::new("KERNEL32.DLL"));
        assert!(base.is_some_and(|b| b != 0));
    }
}
