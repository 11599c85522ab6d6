//! Running the brightness query command without blocking the event loop.
//!
//! This module provides functions for:
//! - Spawning the query command with a piped, non-blocking stdout
//! - Collecting whatever output is available when the pipe becomes readable
//! - Reaping the child without waiting once its stdout reaches EOF

use anyhow::{Context, Result, anyhow};
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::config::Config;
use crate::logs::debug;

/// Switch a pipe to non-blocking mode.
///
/// # Arguments
///
/// - `pipe` - Read end of the child's stdout
///
/// # Errors
///
/// Returns an error if the descriptor flags cannot be read or updated.
fn setup_non_blocking(pipe: &ChildStdout) -> Result<()> {
    let flags = fcntl(pipe, FcntlArg::F_GETFL).context("Failed to get pipe flags")?;
    let new_flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(pipe, FcntlArg::F_SETFL(new_flags)).context("Failed to set pipe to non-blocking")?;
    Ok(())
}

/// Where a query stands after [`PendingQuery::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Still writing output, or exited output-wise but not yet reaped.
    Running,
    /// Reaped. Holds the captured stdout if the command succeeded, `None` if
    /// it exited with a failure status.
    Finished(Option<String>),
}

/// One in-flight run of the query command.
///
/// While [`PendingQuery::pipe`] returns a descriptor the event loop polls it
/// and calls [`PendingQuery::advance`] when it is readable. After EOF the
/// pipe is closed and the child is reaped with `try_wait` on later calls, so
/// a command that closes stdout early never stalls the caller.
#[derive(Debug)]
pub struct PendingQuery {
    child: Child,
    stdout: Option<ChildStdout>,
    buf: Vec<u8>,
}

impl PendingQuery {
    /// Spawn the configured query command.
    ///
    /// stdin and stderr are attached to `/dev/null`; only stdout is captured.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be launched or its stdout pipe
    /// cannot be made non-blocking. In the latter case the child is killed
    /// before returning.
    pub fn spawn(config: &Config) -> Result<Self> {
        let mut child = Command::new(&config.query_program)
            .args(&config.query_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {}", config.query_program))?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(anyhow!("Query command has no stdout pipe"));
        };
        if let Err(e) = setup_non_blocking(&stdout) {
            reap(&mut child);
            return Err(e);
        }

        let query = Self {
            child,
            stdout: Some(stdout),
            buf: Vec::new(),
        };
        debug(&format!("spawned query pid={}", query.id()));
        Ok(query)
    }

    /// Process id of the query command.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// The stdout pipe to poll, or `None` once it has reached EOF.
    #[must_use]
    pub fn pipe(&self) -> Option<BorrowedFd<'_>> {
        self.stdout.as_ref().map(AsFd::as_fd)
    }

    /// Drain available output and, after EOF, check whether the child exited.
    ///
    /// Never blocks: an empty pipe or a child that is still running both
    /// report [`Status::Running`].
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the pipe or checking the child fails.
    pub fn advance(&mut self) -> Result<Status> {
        if self.stdout.is_some() {
            if !self.read_available()? {
                return Ok(Status::Running);
            }
            self.stdout = None;
        }

        let Some(status) = self
            .child
            .try_wait()
            .context("Failed to check query command status")?
        else {
            return Ok(Status::Running);
        };
        if !status.success() {
            debug(&format!("query pid={} exited with {status}", self.id()));
            return Ok(Status::Finished(None));
        }
        Ok(Status::Finished(Some(
            String::from_utf8_lossy(&self.buf).into_owned(),
        )))
    }

    /// Read until the pipe is empty, returning `true` on EOF.
    fn read_available(&mut self) -> Result<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(true);
        };
        let mut chunk = [0u8; 256];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(anyhow!("Error reading query output: {e}")),
            }
        }
    }

    /// Kill the child and reap it, discarding any output.
    pub fn cancel(mut self) {
        debug(&format!("cancelling query pid={}", self.id()));
        reap(&mut self.child);
    }
}

/// Kill and wait for a child, ignoring errors as this is cleanup.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::poll::{PollFd, PollFlags, poll};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Advance the query until it is reaped.
    fn complete(mut query: PendingQuery) -> Result<Option<String>> {
        for _ in 0..100 {
            match query.pipe() {
                Some(fd) => {
                    poll(&mut [PollFd::new(fd, PollFlags::POLLIN)], 100_u8)?;
                }
                None => thread::sleep(Duration::from_millis(20)),
            }
            if let Status::Finished(output) = query.advance()? {
                return Ok(output);
            }
        }
        Err(anyhow!("query did not complete"))
    }

    fn shell(script: &str) -> Config {
        Config::default().with_query("sh", ["-c", script])
    }

    #[test]
    fn test_captures_stdout() -> Result<()> {
        let query = PendingQuery::spawn(&shell("echo 'brightness set to 45%'"))?;
        assert_eq!(complete(query)?.as_deref(), Some("brightness set to 45%\n"));
        Ok(())
    }

    #[test]
    fn test_captures_output_written_in_pieces() -> Result<()> {
        let query = PendingQuery::spawn(&shell("printf 'brightness '; sleep 0.1; echo '80%'"))?;
        assert_eq!(complete(query)?.as_deref(), Some("brightness 80%\n"));
        Ok(())
    }

    #[test]
    fn test_spawn_does_not_wait_for_completion() -> Result<()> {
        let mut query = PendingQuery::spawn(&shell("sleep 0.3; echo '10%'"))?;
        assert_eq!(query.advance()?, Status::Running);
        assert_eq!(complete(query)?.as_deref(), Some("10%\n"));
        Ok(())
    }

    #[test]
    fn test_closed_stdout_does_not_block() -> Result<()> {
        let mut query = PendingQuery::spawn(&shell("echo 50%; exec 1>&-; sleep 2"))?;
        let started = Instant::now();
        while query.pipe().is_some() {
            assert_eq!(query.advance()?, Status::Running);
            assert!(started.elapsed() < Duration::from_secs(1));
        }
        // Pipe is at EOF but the child still sleeps
        assert_eq!(query.advance()?, Status::Running);
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(complete(query)?.as_deref(), Some("50%\n"));
        Ok(())
    }

    #[test]
    fn test_failure_status_discards_output() -> Result<()> {
        let query = PendingQuery::spawn(&shell("echo '45%'; exit 3"))?;
        assert_eq!(complete(query)?, None);
        Ok(())
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let config = Config::default().with_query("/nonexistent/brightnessctl", Vec::<String>::new());
        assert!(PendingQuery::spawn(&config).is_err());
    }

    #[test]
    fn test_cancel_kills_hung_command() -> Result<()> {
        let query = PendingQuery::spawn(&shell("sleep 30"))?;
        let pid = query.id();
        query.cancel();
        // The pid has been reaped, so it no longer exists
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        Ok(())
    }

    #[test]
    fn test_child_signal_mask_is_cleared() -> Result<()> {
        use crate::signals::ShutdownSignal;
        use nix::sys::signal::Signal;

        let _shutdown = ShutdownSignal::for_signals(&[Signal::SIGUSR1, Signal::SIGTERM])?;
        let query = PendingQuery::spawn(&shell("grep SigBlk /proc/self/status"))?;
        let output = complete(query)?.unwrap_or_default();
        assert_eq!(output.split_whitespace().collect::<Vec<_>>(), ["SigBlk:", "0000000000000000"]);
        Ok(())
    }
}
