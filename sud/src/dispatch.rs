//! Arming syscall user dispatch for the current process.

use std::io;
use std::ptr;

use libc::c_ulong;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use sud_sys as ffi;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler;
use crate::policy::AllowList;
use crate::selector::{self, Selector};

/// Installed once by `install`, read by the SIGSYS handler.
pub(crate) static ALLOW_LIST: OnceCell<AllowList> = OnceCell::new();

/// Start address and byte length of the dispatcher region.
pub fn dispatcher_region() -> (usize, usize) {
    let start = unsafe { ptr::addr_of!(ffi::sud_dispatcher_start) } as usize;
    let end = unsafe { ptr::addr_of!(ffi::sud_dispatcher_end) } as usize;

    (start, end - start)
}

/// Confines the calling process to `allow`.
///
/// Installs the SIGSYS handler, registers the dispatcher region with the
/// kernel and flips the selector to `Block`. From the moment this returns,
/// every syscall issued outside the dispatcher region is checked against
/// `allow`. There is no way to undo this short of exiting.
pub fn install(allow: AllowList, config: &Config) -> Result<()> {
    let count = allow.len();
    if ALLOW_LIST.set(allow).is_err() {
        return Err(Error::AlreadyInstalled);
    }
    handler::set_trace_traps(config.trace_traps);

    install_sigsys_handler()?;
    debug!("installed SIGSYS handler");

    let (start, len) = dispatcher_region();
    let res = unsafe {
        libc::prctl(
            ffi::PR_SET_SYSCALL_USER_DISPATCH,
            ffi::PR_SYS_DISPATCH_ON,
            start as c_ulong,
            len as c_ulong,
            selector::as_ptr(),
        )
    };
    if res != 0 {
        return Err(Error::DispatchRegistration(io::Error::last_os_error()));
    }

    info!(syscalls = count, region_start = start, region_len = len, "filter enabled");
    selector::set(Selector::Block);

    Ok(())
}

// Every blockable signal stays pending while a trap is serviced, so no
// handler of the program can run with the selector at Allow. They are
// delivered after rt_sigreturn, with the selector back at Block.
const SERVICING_MASK: u64 = !0;

// The C library's sigaction() installs its own restorer, whose rt_sigreturn
// sits outside the dispatcher region and would trap once the selector is back
// to Block. Going through the raw syscall lets the restorer live in the
// region.
fn install_sigsys_handler() -> Result<()> {
    let action = ffi::kernel_sigaction {
        sa_handler: handler::handle_sigsys as usize,
        sa_flags: libc::SA_SIGINFO as c_ulong | ffi::SA_RESTORER,
        sa_restorer: ffi::sud_restore_rt as usize,
        sa_mask: SERVICING_MASK,
    };

    let res = unsafe {
        libc::syscall(
            libc::SYS_rt_sigaction,
            libc::SIGSYS,
            &action as *const ffi::kernel_sigaction,
            ptr::null_mut::<ffi::kernel_sigaction>(),
            ffi::KERNEL_SIGSET_SIZE,
        )
    };
    if res != 0 {
        return Err(Error::SignalHandler(io::Error::last_os_error()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_covers_trampoline() {
        let (start, len) = dispatcher_region();
        let enter = ffi::sud_enter_syscall as usize;
        let restore = ffi::sud_restore_rt as usize;

        assert!(len > 0);
        assert!((start..start + len).contains(&enter));
        assert!((start..start + len).contains(&restore));
    }

    #[test]
    fn test_servicing_masks_every_signal() {
        for sig in [libc::SIGALRM, libc::SIGCHLD, libc::SIGINT, libc::SIGUSR1, libc::SIGRTMIN()] {
            assert_ne!(SERVICING_MASK & (1u64 << (sig - 1)), 0, "signal {} unmasked", sig);
        }
    }
}
