//! Startup configuration.
//!
//! The values are fixed at startup: there are no flags and no config file.
//! They are still carried in an explicit [`Config`] so that nothing in the
//! pipeline reaches for global paths, and so tests can substitute a
//! temporary backlight root and a scripted query command.

use std::path::PathBuf;

/// Directory under which the kernel exposes backlight devices.
pub const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// Program run to obtain the current brightness percentage.
pub const QUERY_PROGRAM: &str = "brightnessctl";

/// Everything the reporter needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory listing the available backlight devices.
    pub backlight_root: PathBuf,
    /// Program spawned on every update.
    pub query_program: String,
    /// Arguments passed to [`Config::query_program`].
    pub query_args: Vec<String>,
}

impl Config {
    /// Replace the query command.
    #[must_use]
    pub fn with_query<I, S>(mut self, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_program = program.to_string();
        self.query_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the backlight root directory.
    #[must_use]
    pub fn with_backlight_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.backlight_root = root.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backlight_root: PathBuf::from(BACKLIGHT_ROOT),
            query_program: QUERY_PROGRAM.to_string(),
            query_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backlight_root, PathBuf::from("/sys/class/backlight"));
        assert_eq!(config.query_program, "brightnessctl");
        assert!(config.query_args.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_backlight_root("/tmp/backlight")
            .with_query("sh", ["-c", "echo 50%"]);
        assert_eq!(config.backlight_root, PathBuf::from("/tmp/backlight"));
        assert_eq!(config.query_program, "sh");
        assert_eq!(config.query_args, vec!["-c", "echo 50%"]);
    }
}
