//! Shutdown signals delivered through a pollable descriptor.
//!
//! The signals are blocked on the calling thread and routed to a signalfd, so
//! the event loop can treat them like any other readable descriptor. Install
//! it on the main thread before anything else is spawned.

use anyhow::{Context, Result};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::os::fd::{AsFd, BorrowedFd};

/// Signals that end the watch loop.
pub const SHUTDOWN_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

/// Cancellation token backed by a signalfd.
#[derive(Debug)]
pub struct ShutdownSignal {
    fd: SignalFd,
}

impl ShutdownSignal {
    /// Route SIGINT, SIGTERM and SIGHUP to a new signalfd.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal mask cannot be changed or the signalfd
    /// cannot be created.
    pub fn install() -> Result<Self> {
        Self::for_signals(&SHUTDOWN_SIGNALS)
    }

    /// Route an arbitrary set of signals to a new signalfd.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal mask cannot be changed or the signalfd
    /// cannot be created.
    pub fn for_signals(signals: &[Signal]) -> Result<Self> {
        let mut mask = SigSet::empty();
        for signal in signals {
            mask.add(*signal);
        }
        mask.thread_block().context("Failed to block shutdown signals")?;

        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .context("Failed to create signalfd")?;
        Ok(Self { fd })
    }

    /// Consume one pending signal, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the signalfd fails.
    pub fn received(&mut self) -> Result<Option<Signal>> {
        let info = self.fd.read_signal().context("Failed to read signalfd")?;
        Ok(info.and_then(|info| {
            i32::try_from(info.ssi_signo)
                .ok()
                .and_then(|signo| Signal::try_from(signo).ok())
        }))
    }
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;

    #[test]
    fn test_nothing_pending() -> Result<()> {
        let mut shutdown = ShutdownSignal::for_signals(&[Signal::SIGUSR1])?;
        assert_eq!(shutdown.received()?, None);
        Ok(())
    }

    #[test]
    fn test_raised_signal_is_received() -> Result<()> {
        let mut shutdown = ShutdownSignal::for_signals(&[Signal::SIGUSR2])?;
        raise(Signal::SIGUSR2)?;
        assert_eq!(shutdown.received()?, Some(Signal::SIGUSR2));
        assert_eq!(shutdown.received()?, None);
        Ok(())
    }
}
