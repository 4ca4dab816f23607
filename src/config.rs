use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::level::{Format, Level};
use crate::sink::{Destination, Destinations, FanOut, FileSink, LineSink, StderrSink, StdoutSink};

/// Textual configuration inputs, the same four the environment provides.
///
/// Empty strings mean "default": INFO, JSON, and stderr (or the file alone
/// when `file` is set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// `DEBUG`, `INFO`, `WARN`/`WARNING` or `ERROR`.
    pub level: String,
    /// `json` or `text`/`plain`.
    pub format: String,
    /// Destinations joined by `+`, e.g. `stderr+file`.
    pub output: String,
    /// Path used by the `file` destination.
    pub file: String,
}

/// A file destination that could not be opened during a rebuild.
#[derive(Debug)]
pub(crate) struct FileOpenFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Configuration block owned by a logger.
///
/// `sink` and `file` are derived from the other fields by [`Config::rebuild`]
/// and never set directly.
#[derive(Debug)]
pub(crate) struct Config {
    pub level: Level,
    pub format: Format,
    pub destinations: Destinations,
    pub file_path: String,
    pub sink: Arc<FanOut>,
    file: Option<Arc<FileSink>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            destinations: Destinations::only(Destination::Stderr),
            file_path: String::new(),
            sink: Arc::new(FanOut::stderr()),
            file: None,
        }
    }
}

impl Config {
    pub fn set_level(&mut self, name: &str) -> Result<(), ConfigError> {
        self.level = name.parse()?;
        Ok(())
    }

    pub fn set_format(&mut self, name: &str) -> Result<(), ConfigError> {
        self.format = name.parse()?;
        Ok(())
    }

    /// Apply a destination spec against the current file path. The parsed set
    /// is stored even when an error is returned. Call [`Config::rebuild`] after.
    pub fn set_output(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (destinations, err) = Destinations::parse(spec, &self.file_path);
        self.destinations = destinations;
        err.map_or(Ok(()), Err)
    }

    /// Store the trimmed path. Call [`Config::rebuild`] after.
    pub fn set_file(&mut self, path: &str) -> Result<(), ConfigError> {
        self.file_path = path.trim().to_string();
        if self.destinations.contains(Destination::File) && self.file_path.is_empty() {
            return Err(ConfigError::MissingFilePath);
        }
        Ok(())
    }

    /// Apply every option at once. Rejected level and format fall back to
    /// INFO and JSON; all rejections are returned.
    pub fn apply(&mut self, opts: &Options) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        self.level = opts.level.parse().unwrap_or_else(|e| {
            errors.push(e);
            Level::Info
        });
        self.format = opts.format.parse().unwrap_or_else(|e| {
            errors.push(e);
            Format::Json
        });

        let (destinations, err) = Destinations::parse(&opts.output, &opts.file);
        self.file_path = opts.file.trim().to_string();
        self.destinations = destinations;
        errors.extend(err);

        errors
    }

    /// Reassemble the fan-out writer from `destinations` and `file_path`.
    ///
    /// The previous file handle is closed first. A file that cannot be opened
    /// is skipped and returned; when nothing usable remains the writer is
    /// stderr alone.
    pub fn rebuild(&mut self) -> Option<FileOpenFailure> {
        self.close_file();

        let mut failure = None;
        let mut sinks: Vec<Arc<dyn LineSink>> = Vec::with_capacity(3);
        for dest in self.destinations.iter() {
            match dest {
                Destination::Stdout => sinks.push(Arc::new(StdoutSink)),
                Destination::Stderr => sinks.push(Arc::new(StderrSink)),
                Destination::File if self.file_path.is_empty() => {}
                Destination::File => match FileSink::open(&self.file_path) {
                    Ok(file) => {
                        let file = Arc::new(file);
                        self.file = Some(Arc::clone(&file));
                        sinks.push(file);
                    }
                    Err(error) => {
                        failure = Some(FileOpenFailure {
                            path: PathBuf::from(&self.file_path),
                            error,
                        });
                    }
                },
            }
        }

        self.sink = Arc::new(FanOut::new(sinks));
        failure
    }

    /// Close the open file handle, if any, and drop it from the writer.
    pub fn close(&mut self) -> bool {
        let closed = self.close_file();
        if closed {
            self.sink = Arc::new(self.sink.without(Destination::File));
        }
        closed
    }

    fn close_file(&mut self) -> bool {
        self.file.take().map_or(false, |file| file.close())
    }
}
