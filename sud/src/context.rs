//! The only code that knows the x86_64 register layout: reading a trapped
//! syscall out of a saved register file, writing its result back, and
//! re-issuing it through the trampoline.

use libc::{c_long, greg_t};

use sud_sys as ffi;

/// Number of general purpose registers saved in `mcontext_t`.
pub const NGREG: usize = 23;

pub type Gregs = [greg_t; NGREG];

// Registers carrying syscall arguments 1 through 6.
const ARG_REGS: [libc::c_int; 6] = [
    libc::REG_RDI,
    libc::REG_RSI,
    libc::REG_RDX,
    libc::REG_R10,
    libc::REG_R8,
    libc::REG_R9,
];

/// A syscall as captured at the moment it trapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEvent {
    pub nr: i64,
    pub args: [u64; 6],
}

impl SyscallEvent {
    /// Captures the syscall number (RAX) and arguments from the saved
    /// registers of the interrupted thread.
    pub fn capture(gregs: &Gregs) -> SyscallEvent {
        let mut args = [0u64; 6];
        for (arg, &reg) in args.iter_mut().zip(ARG_REGS.iter()) {
            *arg = gregs[reg as usize] as u64;
        }

        SyscallEvent {
            nr: gregs[libc::REG_RAX as usize],
            args,
        }
    }

    /// Issues the syscall through the trampoline and returns the raw kernel
    /// result (a negated errno on failure).
    ///
    /// # Safety
    ///
    /// The syscall runs with whatever effects its number and arguments imply.
    /// The caller must have set the selector to `Allow`.
    pub unsafe fn issue(&self) -> i64 {
        let a = self.args.map(|v| v as c_long);
        ffi::sud_enter_syscall(self.nr as c_long, a[0], a[1], a[2], a[3], a[4], a[5])
    }
}

/// Stores `value` where the interrupted code expects the syscall's result.
pub fn set_return(gregs: &mut Gregs, value: i64) {
    gregs[libc::REG_RAX as usize] = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture() {
        let mut gregs: Gregs = [0; NGREG];
        gregs[libc::REG_RAX as usize] = 1;
        gregs[libc::REG_RDI as usize] = 2;
        gregs[libc::REG_RSI as usize] = 0x1000;
        gregs[libc::REG_RDX as usize] = 5;
        gregs[libc::REG_R10 as usize] = 7;
        gregs[libc::REG_R8 as usize] = -1;
        gregs[libc::REG_R9 as usize] = 9;
        // RCX is not an argument register for syscalls.
        gregs[libc::REG_RCX as usize] = 42;

        let event = SyscallEvent::capture(&gregs);
        assert_eq!(event.nr, 1);
        assert_eq!(event.args, [2, 0x1000, 5, 7, u64::MAX, 9]);
    }

    #[test]
    fn test_set_return() {
        let mut gregs: Gregs = [0; NGREG];
        gregs[libc::REG_RAX as usize] = 39;
        set_return(&mut gregs, -(libc::EPERM as i64));
        assert_eq!(gregs[libc::REG_RAX as usize], -1);
    }

    #[test]
    fn test_issue() {
        let mut gregs: Gregs = [0; NGREG];
        gregs[libc::REG_RAX as usize] = libc::SYS_getppid;

        let event = SyscallEvent::capture(&gregs);
        let res = unsafe { event.issue() };
        assert_eq!(res, unsafe { libc::getppid() } as i64);
    }
}
