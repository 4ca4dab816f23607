//! Environment variable names read by [`Options::from_env`] and
//! [`crate::reload_from_env`].
//!
//! These are helpers only; [`crate::Logger`] itself never reads the
//! environment.

use crate::config::Options;

/// Threshold level name, e.g. `DEBUG`.
pub const KVLOG_LEVEL_ENV: &str = "KVLOG_LOG_LEVEL";

/// Rendering, `json` or `text`.
pub const KVLOG_FORMAT_ENV: &str = "KVLOG_LOG_FMT";

/// Destinations joined by `+`, e.g. `stderr+file`.
pub const KVLOG_OUTPUT_ENV: &str = "KVLOG_OUTPUT";

/// Log file path for the `file` destination.
pub const KVLOG_FILE_ENV: &str = "KVLOG_FILE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Options {
    /// Options from the `KVLOG_*` variables; unset variables are empty.
    pub fn from_env() -> Self {
        Self {
            level: env_or(KVLOG_LEVEL_ENV, ""),
            format: env_or(KVLOG_FORMAT_ENV, ""),
            output: env_or(KVLOG_OUTPUT_ENV, ""),
            file: env_or(KVLOG_FILE_ENV, ""),
        }
    }
}
