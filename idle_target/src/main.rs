//! Disposable live process for injection and pause tests: parks on stdin
//! until the parent closes the pipe or kills it.

use std::io::Read;

fn main() {
    let mut sink = [0u8; 1];
    let _ = std::io::stdin().read(&mut sink);
}
