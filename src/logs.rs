//! Logging and debug utilities.
//!
//! Stdout belongs to the status bar, so every diagnostic goes to stderr, and
//! only when the `DEBUG` environment variable is set.

use std::env;

/// Prefix attached to every diagnostic line.
const PREFIX: &str = "brightness-watch";

/// Returns `true` when the `DEBUG` environment variable is set.
#[must_use]
pub fn enabled() -> bool {
    env::var_os("DEBUG").is_some()
}

/// Print a debug message to stderr if the `DEBUG` environment variable is set.
///
/// # Arguments
///
/// * `message` - The debug message to print
pub fn debug(message: &str) {
    if enabled() {
        eprintln!("{PREFIX}: {message}");
    }
}
