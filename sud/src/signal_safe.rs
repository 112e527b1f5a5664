//! Diagnostics usable from inside a signal handler: formatting goes into a
//! fixed stack buffer and output is a single `write(2)` to stderr.

use std::fmt::{self, Write};

const CAPACITY: usize = 256;

/// A fixed-size formatting buffer that silently truncates.
pub struct StackBuf {
    buf: [u8; CAPACITY],
    len: usize,
}

impl StackBuf {
    pub const fn new() -> StackBuf {
        StackBuf {
            buf: [0; CAPACITY],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for StackBuf {
    fn default() -> StackBuf {
        StackBuf::new()
    }
}

impl Write for StackBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = CAPACITY - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// Writes one `sandbox: ...` line to stderr.
pub fn report(args: fmt::Arguments) {
    let mut line = StackBuf::new();
    let _ = line.write_str("sandbox: ");
    let _ = line.write_fmt(args);
    let _ = line.write_str("\n");

    let bytes = line.as_bytes();
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
    }
}

macro_rules! report {
    ($($arg:tt)*) => {
        $crate::signal_safe::report(format_args!($($arg)*))
    };
}
