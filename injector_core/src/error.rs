use crate::arch::Arch;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between the caller and the target process.
///
/// A successful remote call returns the target's real value, zero included;
/// mechanism failures always surface here instead of overloading the return
/// value.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("no running process with pid {pid}: {source}")]
    NoSuchProcess {
        pid: i32,
        source: windows::core::Error,
    },

    #[error("access denied opening pid {pid} (try running elevated): {source}")]
    AccessDenied {
        pid: i32,
        source: windows::core::Error,
    },

    #[error("architecture mismatch: caller is {caller}, target is {target}")]
    ArchitectureMismatch { caller: Arch, target: Arch },

    #[error("failed to allocate {size} bytes in target: {source}")]
    RemoteAllocFailed {
        size: usize,
        source: windows::core::Error,
    },

    #[error("failed to write {size} bytes at {address:#x} in target: {source}")]
    RemoteWriteFailed {
        address: usize,
        size: usize,
        source: windows::core::Error,
    },

    #[error("failed to create thread in target: {source}")]
    RemoteThreadCreateFailed { source: windows::core::Error },

    /// The target's loader ran but returned null. Missing dependencies, an
    /// invalid image and access denial all land here; the loader does not
    /// tell us apart which.
    #[error("target loader rejected module {}", .path.display())]
    ModuleLoadRejected { path: PathBuf },

    #[error("{context} failed: {source}")]
    Win32 {
        context: &'static str,
        source: windows::core::Error,
    },
}

pub type Result<T> = std::result::Result<T, InjectError>;

impl InjectError {
    /// Wrap `GetLastError` for an ancillary API that reports through it.
    pub(crate) fn last_error(context: &'static str) -> Self {
        Self::Win32 {
            context,
            source: windows::core::Error::from_win32(),
        }
    }
}
