//! Status bar helper printing the screen backlight brightness.
//!
//! Prints a line such as `%{F#83A598}󰃟%{F-} 45%` at startup and again every
//! time the backlight brightness changes. The percentage comes from
//! `brightnessctl`.
//!
//! Exit codes:
//! - 0: Stopped by SIGINT, SIGTERM or SIGHUP
//! - 1: No backlight device found, or a fatal error while watching
//!
//! # Environment Variables
//!
//! - `DEBUG`: When set, enables debug output to stderr.

use anyhow::Result;
use brightness_watch::Config;

fn main() -> Result<()> {
    brightness_watch::run(Config::default())
}
