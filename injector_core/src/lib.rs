#![cfg(windows)]

//! Cross-process module injection and remote invocation.
//!
//! Given a running target process, this crate loads a shared module into the
//! target's address space and invokes thread-start shaped functions inside
//! it, carrying by-value payloads across the process boundary. Everything
//! goes through plain OS mechanisms: no on-disk patching, no cooperation
//! from the target's code, no privilege elevation (the caller must already
//! hold sufficient rights over the target).
//!
//! ```rust,no_run
//! use injector_core::{inject_module, remote_call2, remote_export_address, Process};
//! use std::path::Path;
//!
//! fn main() -> injector_core::Result<()> {
//!     let target = Process::open(1234)?;
//!     let base = inject_module(&target, Path::new("C:\\payload\\hooks.dll"))?;
//!     let entry = remote_export_address("hooks.dll", "install", base)?;
//!     let result = remote_call2(&target, entry, &2i32, &3i32)?;
//!     println!("install returned {result}");
//!     Ok(())
//! }
//! ```
//!
//! Sequential calls against one [`Process`] are strictly ordered and at most
//! one remote region is alive per call. Nothing synchronizes two independent
//! callers injecting into the same target; serialize that yourself, since
//! [`pause`]/[`unpause`] are process-wide.

pub mod arch;
pub mod error;
pub mod inject;
pub mod invoke;
mod memory;
pub mod pause;
pub mod process;
mod snapshot;
mod thread;

pub use arch::Arch;
pub use error::{InjectError, Result};
pub use inject::{inject_module, remote_export_address};
pub use invoke::{remote_call_raw, remote_call1, remote_call2};
pub use pause::{FreezeGuard, freeze, pause, unpause};
pub use process::Process;
