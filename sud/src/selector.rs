//! The dispatch selector byte.
//!
//! The kernel reads this byte on every syscall issued outside the dispatcher
//! region: `Allow` lets the syscall through, `Block` turns it into a SIGSYS.
//! It is process-wide and unsynchronized beyond the atomic store itself, so
//! only one thread may issue syscalls while dispatch is armed.

use std::sync::atomic::{AtomicU8, Ordering};

use sud_sys as ffi;

static SELECTOR: AtomicU8 = AtomicU8::new(ffi::SYSCALL_DISPATCH_FILTER_ALLOW);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Selector {
    /// Syscalls go straight to the kernel.
    Allow = ffi::SYSCALL_DISPATCH_FILTER_ALLOW,

    /// Syscalls outside the dispatcher region trap.
    Block = ffi::SYSCALL_DISPATCH_FILTER_BLOCK,
}

/// Sets the selector.
pub fn set(state: Selector) {
    SELECTOR.store(state as u8, Ordering::SeqCst);
}

pub fn get() -> Selector {
    match SELECTOR.load(Ordering::SeqCst) {
        ffi::SYSCALL_DISPATCH_FILTER_BLOCK => Selector::Block,
        _ => Selector::Allow,
    }
}

/// Address of the selector byte, as registered with the kernel.
pub fn as_ptr() -> *mut u8 {
    SELECTOR.as_ptr()
}
