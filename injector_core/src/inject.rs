//! Module injection: make the target's own loader pull a DLL in for us.

use crate::arch;
use crate::error::{InjectError, Result};
use crate::invoke::remote_call_raw;
use crate::process::Process;
use crate::snapshot;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::Win32::System::LibraryLoader::{GetModuleHandleA, GetModuleHandleW, GetProcAddress};
use windows_strings::{PCSTR, PCWSTR};

/// Load the module at `path` inside the target and return its base address.
///
/// Works by writing the path (UTF-16, terminated) into target memory and
/// remote-calling `LoadLibraryW`, resolved from the caller's own copy of
/// kernel32. That address is only meaningful in the target because system
/// loader code sits at the same address in every process of matching
/// architecture on one running OS instance; the up-front architecture check
/// is what makes this sound.
///
/// The path goes to the loader as-is, no resolution of relative paths. A
/// loader that rejects the module (missing dependencies, invalid image,
/// access denied) reports [`InjectError::ModuleLoadRejected`]; the sub-reason
/// is not recoverable from the outside.
pub fn inject_module(process: &Process, path: &Path) -> Result<usize> {
    arch::ensure_compatible(process.architecture())?;

    let loader = load_library_address()?;

    let payload: Vec<u8> = path
        .as_os_str()
        .encode_wide()
        .chain(Some(0))
        .flat_map(u16::to_le_bytes)
        .collect();

    let exit_value = remote_call_raw(process, loader, &payload)?;
    if exit_value == 0 {
        return Err(InjectError::ModuleLoadRejected {
            path: path.to_path_buf(),
        });
    }

    // a thread exit code is 32 bits, so on 64-bit targets the returned base
    // is truncated; use it only as a success signal and recover the real
    // base from a module snapshot of the target
    match path.file_name().and_then(|n| snapshot::module_base(process.pid(), n)) {
        Some(base) => Ok(base),
        None => {
            log::warn!(
                "{} loaded but absent from the module snapshot; falling back to the thread exit value",
                path.display()
            );
            Ok(exit_value)
        }
    }
}

/// Address of an export of a module loaded in the target, given the target's
/// base for that module.
///
/// The export's offset from the module base is computed in the caller's own
/// loaded copy, so the module must be loaded locally too and the same
/// same-architecture layout precondition as [`inject_module`] applies.
pub fn remote_export_address(local_module: &str, export: &str, remote_base: usize) -> Result<usize> {
    let wide: Vec<u16> = std::ffi::OsStr::new(local_module)
        .encode_wide()
        .chain(Some(0))
        .collect();
    let module = unsafe { GetModuleHandleW(PCWSTR(wide.as_ptr())) }.map_err(|e| {
        InjectError::Win32 {
            context: "GetModuleHandleW",
            source: e,
        }
    })?;

    let mut name = export.as_bytes().to_vec();
    name.push(0);
    let local = unsafe { GetProcAddress(module, PCSTR(name.as_ptr())) }
        .ok_or_else(|| InjectError::last_error("GetProcAddress"))?;

    let offset = local as usize - module.0 as usize;
    Ok(remote_base + offset)
}

/// `LoadLibraryW` in the caller's copy of kernel32.
fn load_library_address() -> Result<usize> {
    let kernel32 = unsafe { GetModuleHandleA(PCSTR(b"kernel32.dll\0".as_ptr())) }.map_err(|e| {
        InjectError::Win32 {
            context: "GetModuleHandleA",
            source: e,
        }
    })?;
    let addr = unsafe { GetProcAddress(kernel32, PCSTR(b"LoadLibraryW\0".as_ptr())) }
        .ok_or_else(|| InjectError::last_error("GetProcAddress(LoadLibraryW)"))?;
    Ok(addr as usize)
}
