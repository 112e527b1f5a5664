//! The SIGSYS handler: the place every trapped syscall ends up.
//!
//! This runs in signal context with the interrupted thread suspended. It must
//! not allocate, lock, or call anything that is not async-signal-safe: the
//! only state it touches is the stack, the selector byte and the allow-list
//! built before dispatch was armed. Output goes through `signal_safe`.

use std::sync::atomic::{AtomicBool, Ordering};

use libc::{c_int, c_void};

use sud_sys as ffi;

use crate::context::{self, SyscallEvent};
use crate::dispatch::ALLOW_LIST;
use crate::selector::{self, Selector};

/// Exit status of a process killed for issuing a syscall outside its policy.
pub const DENIED_EXIT_STATUS: c_int = 1;

static TRACE_TRAPS: AtomicBool = AtomicBool::new(false);

pub(crate) fn set_trace_traps(enabled: bool) {
    TRACE_TRAPS.store(enabled, Ordering::Relaxed);
}

// Fatal precondition check: print what failed and abort.
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            report!("assertion failed: {}", stringify!($cond));
            unsafe { libc::abort() };
        }
    };
}

pub(crate) extern "C" fn handle_sigsys(sig: c_int, info: *mut libc::siginfo_t, ucontext: *mut c_void) {
    // Everything below, including our own diagnostics, must reach the kernel.
    selector::set(Selector::Allow);

    check!(sig == libc::SIGSYS);
    check!(!info.is_null() && !ucontext.is_null());

    let info = unsafe { &*(info as *const ffi::siginfo_sigsys) };
    check!(info.si_signo == libc::SIGSYS);
    check!(info.si_code == ffi::SYS_USER_DISPATCH);
    check!(info.si_errno == 0);

    let uc = unsafe { &mut *(ucontext as *mut libc::ucontext_t) };
    let event = SyscallEvent::capture(&uc.uc_mcontext.gregs);
    check!(event.nr == i64::from(info.si_syscall));

    if TRACE_TRAPS.load(Ordering::Relaxed) {
        report!("trapping (syscall number = {})", event.nr);
    }

    let allow = match ALLOW_LIST.get() {
        Some(a) => a,
        None => {
            report!("assertion failed: SIGSYS before the allow-list was installed");
            unsafe { libc::abort() };
        }
    };

    if !allow.contains(event.nr) {
        report!("syscall {} is not in the policy, terminating", event.nr);
        unsafe { libc::_exit(DENIED_EXIT_STATUS) };
    }

    let ret = unsafe { event.issue() };
    context::set_return(&mut uc.uc_mcontext.gregs, ret);

    // No syscalls past this point: the return goes through sud_restore_rt,
    // inside the dispatcher region.
    selector::set(Selector::Block);
}
