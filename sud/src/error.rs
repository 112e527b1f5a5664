use std::io;
use std::path::PathBuf;

/// Error type for `sud`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `/proc/self/exe` could not be resolved.
    #[error("cannot resolve the running executable: {0}")]
    ExecutableUnresolved(#[source] io::Error),

    /// The program path has no file name to derive a policy name from.
    #[error("cannot derive a policy name from `{0}`")]
    NoProgramName(PathBuf),

    /// The policy artifact could not be opened or read.
    #[error("policy file `{path}` cannot be read: {source}")]
    PolicyOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The policy artifact exists but has no content.
    #[error("policy file `{0}` is empty")]
    PolicyEmpty(PathBuf),

    /// The policy artifact has content but no syscall numbers.
    #[error("no syscalls found in policy file `{0}`")]
    PolicyNoSyscalls(PathBuf),

    /// The dispatcher was already installed in this process.
    #[error("syscall dispatch is already installed")]
    AlreadyInstalled,

    /// Installing the SIGSYS handler failed.
    #[error("cannot install the SIGSYS handler: {0}")]
    SignalHandler(#[source] io::Error),

    /// The kernel refused to enable syscall user dispatch.
    #[error("cannot enable syscall user dispatch: {0}")]
    DispatchRegistration(#[source] io::Error),

    /// An argument for the traced program contained a null byte.
    #[error("argument contains a null byte")]
    NulError(#[from] std::ffi::NulError),

    /// The traced child could not request tracing from its parent.
    #[error("the child could not request tracing")]
    TraceRequest,

    /// The traced child ended up in a state the tracer does not expect.
    #[error("unexpected child state: {0}")]
    UnexpectedChildState(String),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An error occured when using Nix.
    #[error("{context}: {source}")]
    Nix {
        context: &'static str,
        #[source]
        source: nix::Error,
    },
}

impl Error {
    pub(crate) fn nix(context: &'static str) -> impl FnOnce(nix::Error) -> Error {
        move |source| Error::Nix { context, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
