//! Instruction-set width probing for caller and target.
//!
//! A function pointer value only means the same thing in two processes when
//! both run at the same width, so every remote operation checks this first.

use crate::error::{InjectError, Result};
use crate::process::Process;
use std::fmt;
use windows::core::BOOL;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::SystemInformation::{
    GetNativeSystemInfo, PROCESSOR_ARCHITECTURE_AMD64, PROCESSOR_ARCHITECTURE_INTEL, SYSTEM_INFO,
};
use windows::Win32::System::Threading::IsWow64Process;

/// Instruction-set width class of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// The probe was inconclusive; treat the target conservatively.
    Unknown,
    X86,
    X64,
}

impl Arch {
    /// Width this library was compiled for.
    pub const fn caller() -> Self {
        if cfg!(target_arch = "x86_64") {
            Arch::X64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else {
            Arch::Unknown
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Unknown => write!(f, "unknown"),
            Arch::X86 => write!(f, "x86"),
            Arch::X64 => write!(f, "x64"),
        }
    }
}

/// True only when the target's width is known and equals the caller's.
pub fn compatible(process: &Process) -> bool {
    ensure_compatible(process.architecture()).is_ok()
}

/// Fail-fast gate on every remote entry point: rejects a target whose width
/// differs from the caller's or could not be determined, before any remote
/// resource is touched.
pub(crate) fn ensure_compatible(target: Arch) -> Result<()> {
    if target == Arch::Unknown || target != Arch::caller() {
        return Err(InjectError::ArchitectureMismatch {
            caller: Arch::caller(),
            target,
        });
    }
    Ok(())
}

/// Probe a process handle's width via the WOW64 state.
///
/// On a 64-bit OS a WOW64 process is 32-bit and everything else is 64-bit;
/// on a 32-bit OS every process is 32-bit. Returns `Unknown` rather than an
/// error when the query fails (e.g. the process just exited).
pub(crate) fn probe(handle: HANDLE) -> Arch {
    let mut info = SYSTEM_INFO::default();
    unsafe { GetNativeSystemInfo(&mut info) };
    let native = unsafe { info.Anonymous.Anonymous.wProcessorArchitecture };

    if native == PROCESSOR_ARCHITECTURE_INTEL {
        return Arch::X86;
    }
    if native != PROCESSOR_ARCHITECTURE_AMD64 {
        log::warn!("unrecognized native processor architecture {}", native.0);
        return Arch::Unknown;
    }

    let mut wow64 = BOOL::default();
    match unsafe { IsWow64Process(handle, &mut wow64) } {
        Ok(()) if wow64.as_bool() => Arch::X86,
        Ok(()) => Arch::X64,
        Err(e) => {
            log::warn!("IsWow64Process failed: {e}");
            Arch::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_width_is_known() {
        assert_ne!(Arch::caller(), Arch::Unknown);
    }

    #[test]
    fn current_process_is_compatible_with_itself() {
        let process = Process::current().unwrap();
        assert_eq!(process.architecture(), Arch::caller());
        assert!(compatible(&process));
    }

    #[test]
    fn differing_width_is_a_mismatch() {
        let other = match Arch::caller() {
            Arch::X64 => Arch::X86,
            _ => Arch::X64,
        };
        let err = ensure_compatible(other).unwrap_err();
        assert!(matches!(
            err,
            InjectError::ArchitectureMismatch { target, .. } if target == other
        ));
    }

    #[test]
    fn unknown_width_is_a_mismatch() {
        // an inconclusive probe must be treated like a differing one
        let err = ensure_compatible(Arch::Unknown).unwrap_err();
        assert!(matches!(err, InjectError::ArchitectureMismatch { .. }));
    }
}
