//! Backlight brightness reporting for status bars.
//!
//! Prints one polybar-formatted line with the current brightness at startup,
//! then another every time the selected backlight's `brightness` attribute
//! changes.

mod config;
mod device;
mod format;
mod logs;
mod query;
mod reporter;
mod signals;
mod watch;

use anyhow::{Context, Result};
use std::io;

pub use config::Config;
pub use device::{Device, discover};
pub use format::{Formatter, Icon, status_line};
pub use reporter::{Flow, Reporter};
pub use signals::ShutdownSignal;

use logs::debug;

/// Discover the backlight and report its brightness until shut down.
///
/// This function orchestrates the entire process:
/// 1. Route the shutdown signals to a pollable descriptor
/// 2. Select the first backlight device under the configured root
/// 3. Print the current brightness once
/// 4. Print again on every change of the device's brightness attribute
///
/// # Errors
///
/// Returns an error if:
/// - No backlight device can be found
/// - The device's brightness attribute cannot be watched
/// - Polling for events or writing to stdout fails
///
/// # Returns
///
/// `Ok(())` once SIGINT, SIGTERM or SIGHUP has been received.
pub fn run(config: Config) -> Result<()> {
    let shutdown = ShutdownSignal::install()?;

    let device = discover(&config.backlight_root)?;
    debug(&format!("device={device:?}"));

    let mut reporter = Reporter::new(config, &device, io::stdout().lock())
        .with_context(|| format!("Failed to set up reporting for {}", device.id))?
        .with_shutdown(shutdown);
    reporter.run()
}
