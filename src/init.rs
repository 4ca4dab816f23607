use std::sync::LazyLock;

use crate::arg::Arg;
use crate::config::Options;
use crate::error::ConfigError;
use crate::logger::Logger;

static GLOBAL: LazyLock<Logger> = LazyLock::new(|| Logger::new(Options::from_env()).0);

/// Process-wide logger, built from the `KVLOG_*` environment variables on
/// first use.
///
/// Configuration errors at that point are ignored; call
/// [`reload_from_env`] to see them.
pub fn global() -> &'static Logger {
    &GLOBAL
}

/// Re-read the `KVLOG_*` environment variables into the global logger.
///
/// Every variable is applied even when another is rejected; a rejected level
/// or format falls back to INFO or JSON.
pub fn reload_from_env() -> Result<(), ConfigError> {
    global().reload(&Options::from_env())
}

/// See [`Logger::set_level`].
pub fn set_level(name: &str) -> Result<(), ConfigError> {
    global().set_level(name)
}

/// See [`Logger::set_format`].
pub fn set_format(name: &str) -> Result<(), ConfigError> {
    global().set_format(name)
}

/// See [`Logger::set_output`].
pub fn set_output(spec: &str) -> Result<(), ConfigError> {
    global().set_output(spec)
}

/// See [`Logger::set_file`].
pub fn set_file(path: &str) -> Result<(), ConfigError> {
    global().set_file(path)
}

pub fn debug(args: impl IntoIterator<Item = Arg>) {
    global().debug(args)
}

pub fn info(args: impl IntoIterator<Item = Arg>) {
    global().info(args)
}

pub fn warn(args: impl IntoIterator<Item = Arg>) {
    global().warn(args)
}

pub fn error(args: impl IntoIterator<Item = Arg>) {
    global().error(args)
}

/// Log at a level given by name; unknown names log at INFO.
pub fn log(level: &str, args: impl IntoIterator<Item = Arg>) {
    global().log(level, args)
}
