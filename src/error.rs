/// Error returned when a configuration input is rejected.
///
/// The logger always stays usable after one of these: the rejected value is
/// either ignored or replaced with a known-good default.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown log level: {0:?}")]
    UnknownLevel(String),

    #[error("unknown log format: {0:?}")]
    UnknownFormat(String),

    #[error("unknown output destination: {0:?}")]
    UnknownDestination(String),

    #[error("output includes 'file' but file path is empty")]
    MissingFilePath,

    #[error("{}", join(.0))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// Collapse a list of errors into `None`, the single error, or `Multiple`.
    pub(crate) fn collect(mut errors: Vec<ConfigError>) -> Option<ConfigError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ConfigError::Multiple(errors)),
        }
    }
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure to render a record as JSON.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
