//! `LD_PRELOAD` library confining its host process to the syscalls recorded in
//! the program's policy file.
//!
//! Nothing has to be called: the constructor below runs when the dynamic
//! loader maps the library, before the program's `main`. It loads
//! `<policy dir>/policy_syscalls_<program>.txt` and arms syscall user dispatch;
//! if either step fails the process exits with status 1 instead of running
//! unconfined.
//!
//! Environment:
//!
//! * `SANDBOX_POLICY_DIR` - policy directory (default `../policy`)
//! * `SANDBOX_TRACE_TRAPS` - report every trapped syscall on stderr
//! * `SANDBOX_LOG` - log filter for setup messages (default `warn`)

use std::io::{self, IsTerminal, Write};

use sud::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SANDBOX_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

// Simple wrapper that prints an error to standard error and then exits the
// process.
macro_rules! etry {
    ($ex:expr) => {
        match $ex {
            Ok(v) => v,
            Err(e) => {
                let _ = writeln!(io::stderr(), "sandbox: {}", e);
                unsafe { libc::_exit(1) };
            }
        }
    };
}

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging() {
    let directives = std::env::var(LOG_ENV).ok();

    // The host may be a Rust program with its own subscriber; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init();
}

#[cfg_attr(test, allow(dead_code))]
extern "C" fn init() {
    init_logging();

    let config = Config::from_env();
    debug!(?config, "confining process");

    etry!(sud::confine(&config));
}

// Runs `init` at load time. Left out of the test harness, which has no policy.
#[cfg(not(test))]
#[used]
#[link_section = ".init_array"]
static INIT: extern "C" fn() = init;
