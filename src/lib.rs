//! Leveled structured logging with a variadic argument model.
//!
//! A call takes any mix of values: the first is the message, `key, value`
//! pairs become fields, strings holding JSON text are collected as raw data,
//! and a trailing error is reported separately. Each call produces one line,
//! either an ordered JSON object or a human-readable text line, written to
//! any combination of stdout, stderr and a file.
//!
//! ```
//! kvlog::info!("user created", "name", "Jack", "age", 18);
//! kvlog::error!("save failed", "id", 7, kvlog::err("disk full"));
//! ```

pub mod arg;
pub mod caller;
pub mod config;
pub mod encode;
pub mod env;
pub mod error;
pub mod init;
pub mod level;
pub mod logger;
pub mod record;
pub mod sink;

#[cfg(feature = "tracing-bridge")]
pub mod layer;

mod macros;

pub use arg::{err, Arg};
pub use caller::{CallerResolver, StackResolver};
pub use config::Options;
pub use error::{ConfigError, EncodeError};
pub use init::{
    debug, error, global, info, log, reload_from_env, set_file, set_format, set_level, set_output,
    warn,
};
pub use level::{Format, Level};
pub use logger::Logger;
pub use record::{classify, ClassifiedRecord};
pub use sink::{Destination, Destinations};

#[cfg(feature = "tracing-bridge")]
pub use layer::KvLayer;
