//! Profiles a program and adds the syscalls it made to its policy file.
//!
//! Every run only ever adds numbers, so running the program over a
//! representative set of inputs builds up the complete allow-list.

use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use sud::config::{self, DEFAULT_POLICY_DIR, POLICY_DIR_ENV};
use sud::{policy, ChildExit};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Record the syscalls a program makes and merge them into its policy file.
#[derive(Debug, Parser)]
#[command(name = "tracer", version)]
struct Cli {
    /// Directory holding one policy file per program
    #[arg(short = 'd', long, value_name = "DIR", env = POLICY_DIR_ENV, default_value = DEFAULT_POLICY_DIR)]
    policy_dir: PathBuf,

    /// Log the syscalls observed in this run
    #[arg(short, long)]
    verbose: bool,

    /// The program to run, looked up in PATH
    program: OsString,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("tracer: {:#}", e);
        exit(1);
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug,sud=trace"
    } else {
        "info"
    }
}

fn run(cli: &Cli) -> Result<()> {
    let artifact = config::policy_path(&cli.policy_dir, Path::new(&cli.program))?;
    let program = cli.program.to_string_lossy();

    let outcome = sud::trace(&cli.program, &cli.args)
        .with_context(|| format!("could not trace `{}`", program))?;

    match outcome.exit {
        ChildExit::ExecFailed => {
            // Nothing of the program ran, so there is nothing to record.
            warn!(program = %program, "program could not be executed, policy left untouched");
            return Ok(());
        }
        ChildExit::Exited(status) => info!(program = %program, status, "program exited"),
        ChildExit::Signaled(signal) => {
            info!(program = %program, signal = ?signal, "program killed by signal")
        }
    }

    debug!(syscalls = ?outcome.syscalls.iter().collect::<Vec<_>>(), "observed syscalls");

    let merged = policy::merge(&artifact, &outcome.syscalls)
        .with_context(|| format!("could not update `{}`", artifact.display()))?;

    info!(
        path = %artifact.display(),
        observed = outcome.syscalls.len(),
        total = merged.len(),
        "policy updated"
    );

    Ok(())
}
