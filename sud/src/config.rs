use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the policy directory.
pub const POLICY_DIR_ENV: &str = "SANDBOX_POLICY_DIR";

/// Environment variable enabling a diagnostic line for every trapped syscall.
pub const TRACE_TRAPS_ENV: &str = "SANDBOX_TRACE_TRAPS";

/// Policy directory used when none is configured, relative to the working
/// directory of the process.
pub const DEFAULT_POLICY_DIR: &str = "../policy";

/// Runtime configuration shared by the sandbox and the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one policy file per program.
    pub policy_dir: PathBuf,

    /// If `true`, the interception handler reports every trapped syscall.
    pub trace_traps: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            policy_dir: PathBuf::from(DEFAULT_POLICY_DIR),
            trace_traps: false,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Config {
        Config::from_vars(
            env::var_os(POLICY_DIR_ENV).as_deref(),
            env::var_os(TRACE_TRAPS_ENV).as_deref(),
        )
    }

    fn from_vars(policy_dir: Option<&OsStr>, trace_traps: Option<&OsStr>) -> Config {
        let mut config = Config::default();

        if let Some(dir) = policy_dir.filter(|d| !d.is_empty()) {
            config.policy_dir = PathBuf::from(dir);
        }

        if let Some(flag) = trace_traps.and_then(OsStr::to_str) {
            config.trace_traps = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config
    }

    /// Path of the policy artifact for `program` inside this configuration's
    /// policy directory.
    pub fn policy_path(&self, program: &Path) -> Result<PathBuf> {
        policy_path(&self.policy_dir, program)
    }
}

/// Derives `<dir>/policy_syscalls_<basename>.txt` for the given program path.
pub fn policy_path(dir: &Path, program: &Path) -> Result<PathBuf> {
    let name = match program.file_name() {
        Some(n) => n,
        None => return Err(Error::NoProgramName(program.to_path_buf())),
    };

    let mut file = OsString::from("policy_syscalls_");
    file.push(name);
    file.push(".txt");

    Ok(dir.join(file))
}
