//! Least-privilege confinement for x86_64 Linux processes built on syscall
//! user dispatch (`PR_SET_SYSCALL_USER_DISPATCH`).
//!
//! The workflow has two halves. Ahead of time, `trace` runs a program under
//! ptrace and `policy::merge` folds the syscalls it used into that program's
//! policy artifact. At run time, `policy::load_for_current_exe` reads the
//! artifact back and `dispatch::install` arms the kernel so that every syscall
//! the process issues traps into a handler that either performs it on the
//! process's behalf or kills the process.
//!
//! Confinement is single-threaded: the selector byte the kernel consults is
//! shared by every thread of the process.

#[macro_use]
mod signal_safe;

mod handler;

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod policy;
pub mod selector;
pub mod trace;

pub use config::Config;
pub use dispatch::install;
pub use error::{Error, Result};
pub use handler::DENIED_EXIT_STATUS;
pub use policy::AllowList;
pub use selector::Selector;
pub use trace::{trace, ChildExit, TraceOutcome};

/// Loads the current executable's policy and arms dispatch with it.
pub fn confine(config: &Config) -> Result<()> {
    let allow = policy::load_for_current_exe(config)?;
    install(allow, config)
}
