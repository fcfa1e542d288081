//! Test payload loaded into targets by the injector's round-trip tests.
//!
//! Every export is thread-start shaped: one pointer argument in, one 32-bit
//! value out, matching the remote-call payload convention.

use std::ffi::c_void;

/// Reads two i32 laid out back to back at `arg` and returns their sum.
#[unsafe(no_mangle)]
pub extern "system" fn probe_add(arg: *mut c_void) -> u32 {
    if arg.is_null() {
        return 0;
    }
    let pair = arg as *const i32;
    unsafe { (*pair).wrapping_add(*pair.add(1)) as u32 }
}

/// Returns a fixed constant regardless of the argument.
#[unsafe(no_mangle)]
pub extern "system" fn probe_marker(_arg: *mut c_void) -> u32 {
    0x5EED
}

#[unsafe(no_mangle)]
pub extern "system" fn DllMain(_hinst: *mut c_void, _reason: u32, _reserved: *mut c_void) -> i32 {
    1
}
