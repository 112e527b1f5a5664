//! Discovering the syscalls a program needs by running it under ptrace.

use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::policy::AllowList;

// Exit statuses of the forked child before it becomes the target.
const TRACEME_FAILED: i32 = 126;
const EXEC_FAILED: i32 = 127;

/// How the traced program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// The program ran and exited with the given status.
    Exited(i32),

    /// The program ran and was killed by a signal.
    Signaled(Signal),

    /// The program could not be executed at all.
    ExecFailed,
}

/// The result of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOutcome {
    /// Every syscall number observed during the run.
    pub syscalls: AllowList,

    pub exit: ChildExit,
}

/// Runs `program` with `args` to completion, recording the number of every
/// syscall it enters.
///
/// `program` is looked up in `PATH` like a shell would. Only the direct child
/// is traced; anything it forks runs unobserved.
pub fn trace(program: &OsStr, args: &[OsString]) -> Result<TraceOutcome> {
    // Everything the child needs is built here, since it must not allocate
    // after the fork.
    let prog = CString::new(program.as_bytes())?;
    let mut argv = vec![prog.clone()];
    for arg in args {
        argv.push(CString::new(arg.as_bytes())?);
    }
    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
    argv_ptrs.push(ptr::null());

    match unsafe { fork() }.map_err(Error::nix("fork"))? {
        ForkResult::Child => unsafe {
            let null = ptr::null_mut::<libc::c_void>();
            if libc::ptrace(libc::PTRACE_TRACEME, 0, null, null) == -1 {
                libc::_exit(TRACEME_FAILED);
            }
            libc::execvp(prog.as_ptr(), argv_ptrs.as_ptr());

            // If we get here, it's an error
            libc::_exit(EXEC_FAILED);
        },
        ForkResult::Parent { child } => run_tracer(child),
    }
}

fn run_tracer(child: Pid) -> Result<TraceOutcome> {
    let mut session = AllowList::new();

    // The first stop is the SIGTRAP that follows a successful exec.
    match waitpid(child, None).map_err(Error::nix("waitpid"))? {
        WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
        WaitStatus::Exited(_, TRACEME_FAILED) => return Err(Error::TraceRequest),
        WaitStatus::Exited(_, EXEC_FAILED) => {
            return Ok(TraceOutcome {
                syscalls: session,
                exit: ChildExit::ExecFailed,
            })
        }
        other => return Err(Error::UnexpectedChildState(format!("{:?}", other))),
    }

    // Tag syscall stops, report further execs as events instead of SIGTRAP,
    // and take the child down with us if we die.
    ptrace::setoptions(
        child,
        ptrace::Options::PTRACE_O_TRACESYSGOOD
            | ptrace::Options::PTRACE_O_TRACEEXEC
            | ptrace::Options::PTRACE_O_EXITKILL,
    )
    .map_err(Error::nix("ptrace setoptions"))?;

    let mut pending: Option<Signal> = None;
    let exit = loop {
        // Resume until the next syscall entry or exit
        ptrace::syscall(child, pending.take()).map_err(Error::nix("ptrace syscall"))?;

        match waitpid(child, None).map_err(Error::nix("waitpid"))? {
            WaitStatus::PtraceSyscall(pid) => {
                let regs = ptrace::getregs(pid).map_err(Error::nix("ptrace getregs"))?;

                // orig_rax survives the return value overwriting rax.
                if let Ok(nr) = u32::try_from(regs.orig_rax as i64) {
                    if session.insert(nr) {
                        trace!(syscall = nr, "new syscall");
                    }
                }
            }
            WaitStatus::Stopped(_, sig) => {
                // A signal for the target, not a syscall: pass it on.
                debug!(signal = ?sig, "forwarding signal");
                pending = Some(sig);
            }
            WaitStatus::Exited(_, status) => break ChildExit::Exited(status),
            WaitStatus::Signaled(_, sig, _) => break ChildExit::Signaled(sig),
            _ => {}
        }
    };

    Ok(TraceOutcome {
        syscalls: session,
        exit,
    })
}
