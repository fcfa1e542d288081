//! Coarse pause/resume of every thread in the target.
//!
//! Intended for brief windows around injection, not sustained use. The
//! suspend is process-wide and not reference-counted: callers pair `pause`
//! with `unpause` 1:1, or use [`freeze`] and let the guard do the pairing.

use crate::error::{InjectError, Result};
use crate::process::Process;
use crate::snapshot;
use windows::Win32::Foundation::{CloseHandle, FALSE};
use windows::Win32::System::Threading::{
    GetCurrentProcessId, GetCurrentThreadId, OpenThread, ResumeThread, SuspendThread,
    THREAD_SUSPEND_RESUME,
};

/// Suspend every thread currently owned by the target.
///
/// When the target is the calling process, the calling thread is skipped so
/// we do not suspend ourselves mid-operation.
pub fn pause(process: &Process) -> Result<()> {
    set_suspended(process, true)
}

/// Resume every thread currently owned by the target.
pub fn unpause(process: &Process) -> Result<()> {
    set_suspended(process, false)
}

/// Pause the target and get a guard that resumes it on drop, so the pair
/// stays symmetric under early returns and failure paths.
pub fn freeze(process: &Process) -> Result<FreezeGuard<'_>> {
    pause(process)?;
    Ok(FreezeGuard { process })
}

/// Token for a paused target; resumes the target when dropped.
pub struct FreezeGuard<'a> {
    process: &'a Process,
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = unpause(self.process) {
            log::error!("failed to resume pid {}: {e}", self.process.pid());
        }
    }
}

fn set_suspended(process: &Process, suspend: bool) -> Result<()> {
    let own_tid = if process.pid() == unsafe { GetCurrentProcessId() } {
        Some(unsafe { GetCurrentThreadId() })
    } else {
        None
    };

    for tid in snapshot::threads_of(process.pid())? {
        if Some(tid) == own_tid {
            continue;
        }
        // the thread may have exited since the snapshot; that's fine
        let Ok(handle) = (unsafe { OpenThread(THREAD_SUSPEND_RESUME, FALSE.into(), tid) }) else {
            continue;
        };
        let count = if suspend {
            unsafe { SuspendThread(handle) }
        } else {
            unsafe { ResumeThread(handle) }
        };
        if count == u32::MAX {
            log::warn!(
                "{} of thread {tid} failed: {}",
                if suspend { "suspend" } else { "resume" },
                InjectError::last_error("SuspendThread/ResumeThread")
            );
        }
        unsafe { CloseHandle(handle) }.ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command, Stdio};

    // a live process that blocks on stdin until we kill it
    fn spawn_victim() -> Child {
        Command::new("cmd.exe")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn cmd.exe")
    }

    #[test]
    fn pause_unpause_pair_on_child() {
        let mut child = spawn_victim();
        let process = Process::open(child.id() as i32).unwrap();

        pause(&process).unwrap();
        // while paused the child must still be alive, just not scheduled
        assert!(child.try_wait().unwrap().is_none());
        unpause(&process).unwrap();

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn freeze_guard_resumes_on_drop() {
        let mut child = spawn_victim();
        let process = Process::open(child.id() as i32).unwrap();
        {
            let _guard = freeze(&process).unwrap();
        }
        // guard dropped: the child is runnable again and can be torn down
        child.kill().unwrap();
        child.wait().unwrap();
    }
}
