//! Remote invocation: write a payload into the target, run an entry point
//! against it on a fresh remote thread, and read back the result.

use crate::arch;
use crate::error::Result;
use crate::memory::RemoteRegion;
use crate::process::Process;
use crate::thread::RemoteThread;

/// Call `entry` inside the target with `payload` copied verbatim into a
/// freshly allocated remote region; the region's base address is the
/// thread argument.
///
/// `entry` must accept exactly one pointer-sized argument and return one
/// 32-bit value, the same contract the OS puts on any thread-start routine.
/// The payload bytes are by-value blobs: any pointers inside them are only
/// meaningful if they already point into the target's address space.
///
/// `Ok` carries the target's real return value, zero included; every
/// mechanism failure (allocation, write, thread creation, wait) is an `Err`.
/// The region is freed and the thread handle closed on success and failure
/// alike.
pub fn remote_call_raw(process: &Process, entry: usize, payload: &[u8]) -> Result<usize> {
    arch::ensure_compatible(process.architecture())?;

    // an empty payload still gets a real region, so the thread argument is
    // always a valid remote address
    let mut region = RemoteRegion::allocate(process, payload.len().max(1))?;
    if !payload.is_empty() {
        region.write(0, payload)?;
    }

    let thread = RemoteThread::spawn(process, entry, region.base())?;
    let exit_code = thread.join()?;

    region.free();
    Ok(exit_code as usize)
}

/// Call `entry` with one by-value parameter.
pub fn remote_call1<T: Copy>(process: &Process, entry: usize, param: &T) -> Result<usize> {
    let mut payload = Vec::with_capacity(size_of::<T>());
    append_value(&mut payload, param);
    remote_call_raw(process, entry, &payload)
}

/// Call `entry` with two by-value parameters laid out back to back, the
/// second aligned to its natural alignment.
///
/// The callee receives a single pointer and must know this exact layout by
/// contract; this is not a general marshaling format.
pub fn remote_call2<T: Copy, U: Copy>(
    process: &Process,
    entry: usize,
    param1: &T,
    param2: &U,
) -> Result<usize> {
    let payload = pack2(param1, param2);
    remote_call_raw(process, entry, &payload)
}

fn pack2<T: Copy, U: Copy>(param1: &T, param2: &U) -> Vec<u8> {
    let offset2 = size_of::<T>().next_multiple_of(align_of::<U>().max(1));
    let mut payload = Vec::with_capacity(offset2 + size_of::<U>());
    append_value(&mut payload, param1);
    payload.resize(offset2, 0);
    append_value(&mut payload, param2);
    payload
}

fn append_value<T: Copy>(buf: &mut Vec<u8>, value: &T) {
    // SAFETY: T is Copy and fully initialized; we read its object
    // representation only
    let bytes =
        unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) };
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;

    #[test]
    fn pack2_is_back_to_back_for_same_size() {
        let payload = pack2(&2i32, &3i32);
        assert_eq!(payload.len(), 8);
        assert_eq!(&payload[..4], &2i32.to_le_bytes());
        assert_eq!(&payload[4..], &3i32.to_le_bytes());
    }

    #[test]
    fn pack2_aligns_second_parameter() {
        let payload = pack2(&0xABu8, &0x1122_3344u32);
        assert_eq!(payload.len(), 8);
        assert_eq!(payload[0], 0xAB);
        assert_eq!(&payload[4..], &0x1122_3344u32.to_le_bytes());
    }

    extern "system" fn add_pair(arg: *mut c_void) -> u32 {
        let pair = arg as *const i32;
        unsafe { (*pair).wrapping_add(*pair.add(1)) as u32 }
    }

    extern "system" fn first_byte(arg: *mut c_void) -> u32 {
        unsafe { *(arg as *const u8) as u32 }
    }

    extern "system" fn always_zero(_arg: *mut c_void) -> u32 {
        0
    }

    #[test]
    fn two_parameter_call_into_self() {
        let process = Process::current().unwrap();
        let sum = remote_call2(&process, add_pair as usize, &2i32, &3i32).unwrap();
        assert_eq!(sum, 5);
    }

    #[test]
    fn one_parameter_call_into_self() {
        let process = Process::current().unwrap();
        let got = remote_call1(&process, first_byte as usize, &0xC3u8).unwrap();
        assert_eq!(got, 0xC3);
    }

    #[test]
    fn zero_return_is_success_not_failure() {
        let process = Process::current().unwrap();
        assert_eq!(
            remote_call_raw(&process, always_zero as usize, &[]).unwrap(),
            0
        );
    }

    #[test]
    fn call_against_dead_target_fails_cleanly() {
        use crate::error::InjectError;
        use std::process::{Command, Stdio};

        let mut child = Command::new("cmd.exe")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn cmd.exe");
        let process = Process::open(child.id() as i32).unwrap();
        child.kill().unwrap();
        child.wait().unwrap();

        // the handle outlives the process; allocation is the first step to
        // notice the target is gone and must surface as a mechanism failure
        let err = remote_call_raw(&process, always_zero as usize, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, InjectError::RemoteAllocFailed { .. }));

        // the failed call left the engine in a clean state: a fresh call
        // against a live target still goes through
        let me = Process::current().unwrap();
        assert_eq!(remote_call2(&me, add_pair as usize, &2i32, &3i32).unwrap(), 5);
    }
}
