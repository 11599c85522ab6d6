//! The event loop tying the watcher, query processes and output together.
//!
//! One `poll(2)` call multiplexes three kinds of descriptors:
//! - the inotify descriptor of the [`Watcher`]
//! - the signalfd of the optional [`ShutdownSignal`]
//! - the stdout pipe of every in-flight [`PendingQuery`]
//!
//! A query whose pipe has reached EOF but whose process has not exited yet
//! has nothing left to poll. While such a query exists the wait is capped at
//! [`REAP_INTERVAL_MS`] so its exit status is picked up without blocking.
//!
//! Every change event spawns its own query. Queries are neither coalesced
//! nor serialized, and each one prints its line as soon as it completes, so
//! overlapping queries may print in a different order than they were
//! triggered.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::Write;
use std::os::fd::AsFd;

use crate::config::Config;
use crate::device::Device;
use crate::format::Formatter;
use crate::logs::debug;
use crate::query::{PendingQuery, Status};
use crate::signals::ShutdownSignal;
use crate::watch::Watcher;

/// Longest wait, in milliseconds, while a query awaits reaping.
const REAP_INTERVAL_MS: u16 = 50;

/// Whether the loop should keep going after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep waiting for events.
    Continue,
    /// A shutdown signal arrived and every query has been reaped.
    Shutdown,
}

/// Prints a status line now and after every brightness change.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    config: Config,
    formatter: Formatter,
    watcher: Watcher,
    shutdown: Option<ShutdownSignal>,
    pending: Vec<PendingQuery>,
    out: W,
}

impl<W: Write> Reporter<W> {
    /// Set up the watch on `device` and prepare to write lines to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the brightness file cannot be watched or the
    /// output pattern cannot be compiled.
    pub fn new(config: Config, device: &Device, out: W) -> Result<Self> {
        let watcher = Watcher::new(&device.brightness_path)?;
        let formatter = Formatter::new()?;
        Ok(Self {
            config,
            formatter,
            watcher,
            shutdown: None,
            pending: Vec::new(),
            out,
        })
    }

    /// Stop the loop when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Number of queries still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Output written so far.
    #[must_use]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Start one query run without waiting for it.
    ///
    /// A command that cannot be launched only costs this cycle's update.
    pub fn refresh(&mut self) {
        match PendingQuery::spawn(&self.config) {
            Ok(query) => self.pending.push(query),
            Err(e) => debug(&format!("skipping update: {e:#}")),
        }
    }

    /// Print once, then keep printing on every change until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if polling, reading change events or writing to the
    /// output fails.
    pub fn run(&mut self) -> Result<()> {
        self.refresh();
        while self.turn(PollTimeout::NONE)? == Flow::Continue {}
        Ok(())
    }

    /// Wait up to `timeout` for events and handle everything that is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if polling, reading change events or writing to the
    /// output fails. Failures of individual queries are not errors.
    pub fn turn(&mut self, timeout: PollTimeout) -> Result<Flow> {
        let reaping = self.pending.iter().any(|query| query.pipe().is_none());
        let timeout = if reaping {
            cap_timeout(timeout, REAP_INTERVAL_MS)
        } else {
            timeout
        };

        let ready = {
            let mut fds = Vec::with_capacity(self.pending.len() + 2);
            fds.push(PollFd::new(self.watcher.as_fd(), PollFlags::POLLIN));
            if let Some(shutdown) = &self.shutdown {
                fds.push(PollFd::new(shutdown.as_fd(), PollFlags::POLLIN));
            }
            for pipe in self.pending.iter().filter_map(PendingQuery::pipe) {
                fds.push(PollFd::new(pipe, PollFlags::POLLIN));
            }

            match poll(&mut fds, timeout) {
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(Flow::Continue),
                Err(e) => return Err(e).context("Failed to poll for events"),
            }

            fds.iter()
                .map(|fd| fd.revents().is_some_and(|revents| !revents.is_empty()))
                .collect::<Vec<_>>()
        };

        let mut ready = ready.into_iter();
        let watch_ready = ready.next().unwrap_or(false);
        let shutdown_ready = self.shutdown.is_some() && ready.next().unwrap_or(false);
        // Queries without a pipe are always due for a reaping attempt
        let queries_ready = self
            .pending
            .iter()
            .map(|query| query.pipe().is_none() || ready.next().unwrap_or(false))
            .collect::<Vec<_>>();

        if shutdown_ready && self.check_shutdown()? {
            return Ok(Flow::Shutdown);
        }

        self.reap_finished(&queries_ready)?;

        if watch_ready {
            for _ in 0..self.watcher.drain()? {
                self.refresh();
            }
        }

        Ok(Flow::Continue)
    }

    /// Consume a pending shutdown signal and cancel every running query.
    fn check_shutdown(&mut self) -> Result<bool> {
        let Some(shutdown) = self.shutdown.as_mut() else {
            return Ok(false);
        };
        let Some(signal) = shutdown.received()? else {
            return Ok(false);
        };

        debug(&format!("received {signal}, shutting down"));
        for query in self.pending.drain(..) {
            query.cancel();
        }
        Ok(true)
    }

    /// Advance the queries that are due, printing completed ones.
    fn reap_finished(&mut self, ready: &[bool]) -> Result<()> {
        let mut running = Vec::with_capacity(self.pending.len());
        let mut outputs = Vec::new();

        for (index, mut query) in self.pending.drain(..).enumerate() {
            if !ready.get(index).copied().unwrap_or(false) {
                running.push(query);
                continue;
            }
            match query.advance() {
                Ok(Status::Running) => running.push(query),
                Ok(Status::Finished(Some(output))) => outputs.push(output),
                Ok(Status::Finished(None)) => {}
                Err(e) => {
                    debug(&format!("skipping update: {e:#}"));
                    query.cancel();
                }
            }
        }
        self.pending = running;

        for output in outputs {
            self.print(&output)?;
        }
        Ok(())
    }

    /// Write the status line for one query's output, if it has a percentage.
    fn print(&mut self, output: &str) -> Result<()> {
        let Some(line) = self.formatter.render(output) else {
            debug(&format!("no percentage in {output:?}"));
            return Ok(());
        };
        writeln!(self.out, "{line}").context("Failed to write status line")?;
        self.out.flush().context("Failed to flush status line")
    }
}

/// Shorten `timeout` to at most `cap_ms` milliseconds.
fn cap_timeout(timeout: PollTimeout, cap_ms: u16) -> PollTimeout {
    let millis = i32::from(timeout);
    if (0..=i32::from(cap_ms)).contains(&millis) {
        timeout
    } else {
        PollTimeout::from(cap_ms)
    }
}
