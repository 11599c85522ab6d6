//! Parsing query output and rendering status bar lines.
//!
//! This module provides functions for:
//! - Extracting the brightness percentage from the query command's output
//! - Mapping a percentage to one of three icons
//! - Rendering the polybar markup for a status line

use anyhow::{Context, Result};
use regex::Regex;

/// Foreground color applied to the icon.
const ICON_COLOR: &str = "#83A598";

/// Percentages at or above this value use [`Icon::Full`].
const FULL_THRESHOLD: u32 = 70;

/// Percentages at or below this value use [`Icon::Low`].
const LOW_THRESHOLD: u32 = 30;

/// Brightness icon, chosen from the current percentage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    /// 70% and above.
    Full,
    /// Strictly between 30% and 70%.
    Medium,
    /// 30% and below.
    Low,
}

impl Icon {
    /// Pick the icon for a brightness percentage.
    ///
    /// # Arguments
    ///
    /// * `percentage` - Brightness percentage, normally 0-100
    ///
    /// # Returns
    ///
    /// - [`Icon::Full`] if `percentage >= 70`
    /// - [`Icon::Medium`] if `30 < percentage < 70`
    /// - [`Icon::Low`] if `percentage <= 30`
    #[must_use]
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= FULL_THRESHOLD {
            Self::Full
        } else if percentage > LOW_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// The Nerd Font glyph for this icon.
    #[must_use]
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Full => "\u{f00e0}",
            Self::Medium => "\u{f00df}",
            Self::Low => "\u{f00de}",
        }
    }
}

/// Render the status line for `percentage`.
///
/// Only the icon is wrapped in the color tags, e.g.
/// `%{F#83A598}<icon>%{F-} 45%`.
#[must_use]
pub fn status_line(percentage: u32) -> String {
    let icon = Icon::from_percentage(percentage).glyph();
    format!("%{{F{ICON_COLOR}}}{icon}%{{F-}} {percentage}%")
}

/// Turns raw query output into status lines.
#[derive(Debug, Clone)]
pub struct Formatter {
    pattern: Regex,
}

impl Formatter {
    /// Compile the percentage pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regular expression fails to compile.
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"(\d+)%").context("Failed to compile percentage regex")?;
        Ok(Self { pattern })
    }

    /// Extract the brightness percentage from the query command's output.
    ///
    /// The first `<digits>%` sequence wins. Output such as
    /// `"Current brightness: 96000 (45%)"` yields `Some(45)`.
    ///
    /// # Returns
    ///
    /// - `Some(u32)` with the parsed percentage
    /// - `None` if no `<digits>%` sequence is present or the digits overflow `u32`
    #[must_use]
    pub fn percentage(&self, output: &str) -> Option<u32> {
        self.pattern
            .captures(output.trim())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Render the status line for the query command's output.
    ///
    /// Returns `None` when no percentage can be extracted; such cycles print
    /// nothing.
    #[must_use]
    pub fn render(&self, output: &str) -> Option<String> {
        self.percentage(output).map(status_line)
    }
}
