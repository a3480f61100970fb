//! # Output Configuration
//!
//! Utilities for controlling CLI output appearance. Color is decided once,
//! from the `--color` flag and the conventional environment variables
//! (`NO_COLOR`, `CLICOLOR`, `CLICOLOR_FORCE`, `TERM=dumb`), and carried
//! through the commands. Long-running batches show an indicatif spinner
//! that stays silent when stderr is not a terminal.

use std::env;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Output configuration for controlling colors and progress decoration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and progress decoration should be used.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// - `--color=always`: force colors on (overrides `NO_COLOR`)
    /// - `--color=never`: force colors off
    /// - `--color=auto`: detect from the environment
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // https://no-color.org/: presence alone disables colors.
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    /// A ticking spinner for a long-running batch, or a hidden one when
    /// decoration is off.
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if !self.use_color || !console::Term::stderr().is_term() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner().with_message(message.to_string());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    /// Apply success styling to a summary line.
    pub fn good(&self, text: &str) -> String {
        if self.use_color {
            console::style(text).green().to_string()
        } else {
            text.to_string()
        }
    }

    /// Apply warning styling to a summary line.
    pub fn bad(&self, text: &str) -> String {
        if self.use_color {
            console::style(text).red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}
