use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::arg::Arg;
use crate::caller::{CallerResolver, StackResolver};
use crate::config::{Config, FileOpenFailure, Options};
use crate::encode::{self, Header};
use crate::error::ConfigError;
use crate::level::{Format, Level};
use crate::record::classify;
use crate::sink::{Destinations, FanOut};

/// Leveled logger writing one line per call to its configured destinations.
///
/// All methods take `&self`; a logger can be shared across threads. Setters
/// hold the write lock while the writer is rebuilt, log calls hold the read
/// lock only long enough to copy the level, format and writer.
pub struct Logger {
    config: RwLock<Config>,
    resolver: Arc<dyn CallerResolver>,
}

impl Logger {
    /// Build a logger from `opts`.
    ///
    /// The logger is always usable. Rejected options fall back to their
    /// defaults and are reported through the second element.
    pub fn new(opts: Options) -> (Self, Option<ConfigError>) {
        let mut config = Config::default();
        let errors = config.apply(&opts);
        let failure = config.rebuild();
        report(failure);

        let logger = Self {
            config: RwLock::new(config),
            resolver: Arc::new(StackResolver::new()),
        };
        (logger, ConfigError::collect(errors))
    }

    /// Replace the call-site resolver.
    pub fn with_resolver(mut self, resolver: impl CallerResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Re-apply every option, as on startup.
    pub fn reload(&self, opts: &Options) -> Result<(), ConfigError> {
        let (errors, failure, summary) = {
            let mut config = self.config.write();
            let errors = config.apply(opts);
            let failure = config.rebuild();
            let summary = (config.level, config.format, config.sink.destinations());
            (errors, failure, summary)
        };
        report(failure);
        tracing::debug!(
            target: "kvlog::config",
            level = %summary.0,
            format = %summary.1,
            output = %summary.2,
            "logger reloaded"
        );
        ConfigError::collect(errors).map_or(Ok(()), Err)
    }

    /// Set the threshold. An unknown name leaves it unchanged.
    pub fn set_level(&self, name: &str) -> Result<(), ConfigError> {
        self.config.write().set_level(name)
    }

    /// Set the rendering. An unknown name leaves it unchanged.
    pub fn set_format(&self, name: &str) -> Result<(), ConfigError> {
        self.config.write().set_format(name)
    }

    /// Select destinations from a `+`-joined spec and rebuild the writer.
    ///
    /// An empty spec means the file alone if a path was set before, stderr
    /// otherwise. On any error the writer still ends up with at least stderr.
    pub fn set_output(&self, spec: &str) -> Result<(), ConfigError> {
        self.reconfigure(|config| config.set_output(spec))
    }

    /// Set the file path and rebuild the writer.
    pub fn set_file(&self, path: &str) -> Result<(), ConfigError> {
        self.reconfigure(|config| config.set_file(path))
    }

    pub fn level(&self) -> Level {
        self.config.read().level
    }

    pub fn format(&self) -> Format {
        self.config.read().format
    }

    /// Destinations as requested, including a `file` that produced no writer.
    pub fn destinations(&self) -> Destinations {
        self.config.read().destinations
    }

    /// Destinations the writer currently writes to.
    pub fn active_destinations(&self) -> Destinations {
        self.config.read().sink.destinations()
    }

    pub fn file_path(&self) -> String {
        self.config.read().file_path.clone()
    }

    pub fn is_debug(&self) -> bool {
        self.level() == Level::Debug
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Close the log file. Later lines go to the remaining destinations, or
    /// to stderr if the file was the only one.
    pub fn close(&self) {
        self.config.write().close();
    }

    pub fn debug(&self, args: impl IntoIterator<Item = Arg>) {
        self.emit(Level::Debug, args);
    }

    pub fn info(&self, args: impl IntoIterator<Item = Arg>) {
        self.emit(Level::Info, args);
    }

    pub fn warn(&self, args: impl IntoIterator<Item = Arg>) {
        self.emit(Level::Warn, args);
    }

    pub fn error(&self, args: impl IntoIterator<Item = Arg>) {
        self.emit(Level::Error, args);
    }

    /// Log at a level given by name; unknown names log at INFO.
    pub fn log(&self, level: &str, args: impl IntoIterator<Item = Arg>) {
        self.emit(level.parse().unwrap_or(Level::Info), args);
    }

    /// Log with an already known call site, skipping stack resolution.
    pub fn log_at(&self, level: Level, caller: &str, args: impl IntoIterator<Item = Arg>) {
        if let Some((format, sink)) = self.snapshot(level) {
            write_record(&sink, format, level, caller, args);
        }
    }

    fn emit(&self, level: Level, args: impl IntoIterator<Item = Arg>) {
        let Some((format, sink)) = self.snapshot(level) else {
            return;
        };
        let caller = self.resolver.resolve();
        write_record(&sink, format, level, &caller, args);
    }

    /// Format and writer for a call at `level`, or `None` if it is filtered out.
    fn snapshot(&self, level: Level) -> Option<(Format, Arc<FanOut>)> {
        let config = self.config.read();
        if level < config.level {
            return None;
        }
        Some((config.format, Arc::clone(&config.sink)))
    }

    fn reconfigure(
        &self,
        change: impl FnOnce(&mut Config) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        let (result, failure) = {
            let mut config = self.config.write();
            let result = change(&mut config);
            (result, config.rebuild())
        };
        report(failure);
        result
    }
}

impl Default for Logger {
    /// INFO, JSON, stderr.
    fn default() -> Self {
        Self::new(Options::default()).0
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config.read();
        f.debug_struct("Logger")
            .field("level", &config.level)
            .field("format", &config.format)
            .field("destinations", &config.destinations.to_string())
            .field("file_path", &config.file_path)
            .finish()
    }
}

fn write_record(
    sink: &FanOut,
    format: Format,
    level: Level,
    caller: &str,
    args: impl IntoIterator<Item = Arg>,
) {
    let record = classify(args.into_iter().collect());
    let ts = encode::timestamp();
    let header = Header { ts: &ts, level, caller };
    sink.write_line(&encode::render(format, &header, &record));
}

/// Emitted outside the configuration lock, so a tracing bridge that routes
/// back into this logger cannot deadlock.
fn report(failure: Option<FileOpenFailure>) {
    if let Some(failure) = failure {
        tracing::debug!(
            target: "kvlog::config",
            path = %failure.path.display(),
            error = %failure.error,
            "log file could not be opened, file destination skipped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::err;
    use crate::sink::Destination;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn file_logger(temp: &TempDir, level: &str, format: &str) -> (Logger, std::path::PathBuf) {
        let path = temp.path().join("app.log");
        let (logger, err) = Logger::new(Options {
            level: level.into(),
            format: format.into(),
            output: String::new(),
            file: path.to_str().unwrap().into(),
        });
        assert_eq!(err, None);
        (logger.with_resolver(|| "test.rs:1".to_string()), path)
    }

    fn lines(path: &std::path::Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn threshold_filters_lower_levels() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "", "");

        logger.debug(vec!["hidden".into()]);
        logger.info(vec!["a".into()]);
        logger.warn(vec!["b".into()]);
        logger.error(vec!["c".into()]);

        let levels: Vec<String> = lines(&path)
            .iter()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["lv"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(levels, vec!["INFO", "WARN", "ERROR"]);
    }

    #[test]
    fn filtered_calls_do_not_resolve_callers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let temp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (logger, _) = file_logger(&temp, "warn", "");
        let logger = logger.with_resolver(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            "x.rs:1".to_string()
        });

        logger.debug(vec!["no".into()]);
        logger.info(vec!["no".into()]);
        logger.warn(vec!["yes".into()]);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn json_line_written_with_caller() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "info", "json");
        logger.info(vec!["msg".into(), "name".into(), "Jack".into(), "age".into(), 18.into(), err("boom")]);

        let line = &lines(&path)[0];
        assert!(line.contains(r#""caller":"test.rs:1","msg":"msg","age":18,"name":"Jack","err":"boom"}"#));
    }

    #[test]
    fn dynamic_level_defaults_to_info() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "info", "text");
        logger.log("warning", vec!["w".into()]);
        logger.log("nonsense", vec!["i".into()]);
        logger.log("debug", vec!["d".into()]);

        let lines = lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" WARN test.rs:1 w"));
        assert!(lines[1].contains(" INFO test.rs:1 i"));
    }

    #[test]
    fn debug_text_line_ends_with_pair() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "DEBUG", "text");
        assert!(logger.is_debug());
        logger.debug(vec!["now debug".into(), "k".into(), "v".into()]);

        let line = &lines(&path)[0];
        assert!(line.contains(" DEBUG "));
        assert!(line.ends_with(r#"k="v""#));
    }

    #[test]
    fn setters_switch_format_and_level_at_runtime() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "", "");
        logger.debug(vec!["before".into()]);
        logger.set_level("debug").unwrap();
        logger.set_format("plain").unwrap();
        logger.debug(vec!["after".into()]);

        let lines = lines(&path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" DEBUG test.rs:1 after"));
    }

    #[test]
    fn rejected_setters_keep_configuration() {
        let logger = Logger::default();
        assert!(logger.set_level("trace").is_err());
        assert!(logger.set_format("yaml").is_err());
        assert_eq!(logger.level(), Level::Info);
        assert_eq!(logger.format(), Format::Json);
    }

    #[test]
    fn empty_output_with_file_path_means_file_only() {
        let temp = TempDir::new().unwrap();
        let logger = Logger::default();
        logger.set_file(temp.path().join("app.log").to_str().unwrap()).unwrap();
        logger.set_output("").unwrap();
        assert_eq!(logger.active_destinations(), Destinations::only(Destination::File));
    }

    #[test]
    fn file_output_without_path_falls_back_to_stderr() {
        let logger = Logger::default();
        assert_eq!(logger.set_output("file"), Err(ConfigError::MissingFilePath));
        assert!(logger.destinations().contains(Destination::File));
        assert_eq!(logger.active_destinations(), Destinations::only(Destination::Stderr));
    }

    #[test]
    fn destination_spec_reuses_previous_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sticky.log");
        let logger = Logger::default().with_resolver(|| "t.rs:2".to_string());
        logger.set_file(path.to_str().unwrap()).unwrap();
        logger.set_output("stdout").unwrap();
        logger.set_output("file").unwrap();
        logger.info(vec!["kept".into()]);

        assert_eq!(logger.file_path(), path.to_str().unwrap());
        assert_eq!(lines(&path).len(), 1);
    }

    #[test]
    fn repeated_setters_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let logger = Logger::default();
        let path = temp.path().join("a.log");
        for _ in 0..2 {
            logger.set_file(path.to_str().unwrap()).unwrap();
            logger.set_output("stderr+file").unwrap();
            logger.set_level("warn").unwrap();
        }
        let expected: Destinations = [Destination::Stderr, Destination::File].into_iter().collect();
        assert_eq!(logger.destinations(), expected);
        assert_eq!(logger.active_destinations(), expected);
        assert_eq!(logger.level(), Level::Warn);
    }

    #[test]
    fn new_reports_first_errors_but_stays_usable() {
        let (logger, err) = Logger::new(Options {
            level: "loud".into(),
            format: "json".into(),
            output: "file".into(),
            file: String::new(),
        });
        assert!(matches!(err, Some(ConfigError::Multiple(ref v)) if v.len() == 2));
        assert_eq!(logger.level(), Level::Info);
        assert_eq!(logger.active_destinations(), Destinations::only(Destination::Stderr));
    }

    #[test]
    fn reload_applies_everything() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("r.log");
        let logger = Logger::default().with_resolver(|| "r.rs:3".to_string());
        logger
            .reload(&Options {
                level: "error".into(),
                format: "text".into(),
                output: String::new(),
                file: path.to_str().unwrap().into(),
            })
            .unwrap();
        logger.warn(vec!["dropped".into()]);
        logger.error(vec!["kept".into()]);

        let lines = lines(&path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" ERROR r.rs:3 kept"));
    }

    #[test]
    fn close_releases_file_and_falls_back() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "", "text");
        logger.info(vec!["one".into()]);
        logger.close();
        logger.close();
        logger.info(vec!["two".into()]);

        assert_eq!(lines(&path).len(), 1);
        assert_eq!(logger.active_destinations(), Destinations::only(Destination::Stderr));
    }

    #[test]
    fn concurrent_logging_and_reconfiguration() {
        let temp = TempDir::new().unwrap();
        let (logger, path) = file_logger(&temp, "", "json");
        let logger = Arc::new(logger);
        let path_str = path.to_str().unwrap().to_string();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        logger.info(vec!["tick".into(), "thread".into(), t.into(), "i".into(), i.into()]);
                    }
                })
            })
            .collect();
        let reconfig = {
            let logger = Arc::clone(&logger);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    logger.set_file(&path_str).unwrap();
                    logger.set_format("json").unwrap();
                }
            })
        };
        for handle in writers {
            handle.join().unwrap();
        }
        reconfig.join().unwrap();

        // Lines written while a handle was being swapped may be lost, but
        // every line that landed is whole.
        let lines = lines(&path);
        assert!(!lines.is_empty());
        for line in lines {
            let v: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(v["msg"], "tick");
        }
    }
}
