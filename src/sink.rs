//! Outbound sink convenience wrappers. The serializer only requires
//! `std::io::Write`; this module provides the "spawn a child per flush"
//! behavior spec.md §6 mentions the original uses, for callers who want
//! it without hand-rolling process plumbing.

use std::io;
use std::process::{Child, ChildStdin, Command, Stdio};

/// Spawns `command` and writes flush output to its stdin. Dropping (or
/// explicitly finishing) this sink closes the stdin pipe and waits for
/// the child to exit, logging a non-zero exit status.
pub struct ChildProcessSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ChildProcessSink {
    /// Spawns `command` with a piped stdin.
    ///
    /// # Errors
    /// Returns any [`io::Error`] raised while spawning the process or if
    /// the child's stdin could not be captured.
    pub fn spawn(command: &str) -> io::Result<Self> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child process stdin was not piped"))?;
        Ok(Self {
            child,
            stdin: Some(stdin),
        })
    }

    /// Closes stdin and waits for the child to exit, logging a non-zero
    /// status at ERROR per spec.md §7's serializer-sink-error handling.
    ///
    /// Equivalent to dropping the sink; kept as an explicit method for
    /// callers that want to observe the moment the child is reaped
    /// rather than relying on scope exit.
    pub fn finish(self) {
        drop(self);
    }
}

impl Drop for ChildProcessSink {
    fn drop(&mut self) {
        self.stdin.take();
        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::error!(?status, "flush child process exited non-zero");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to wait on flush child process");
            }
            Ok(_) => {}
        }
    }
}

impl io::Write for ChildProcessSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stdin {
            Some(stdin) => stdin.write(buf),
            None => Err(io::Error::other("sink already finished")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stdin {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}
