use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::arg::Arg;
use crate::caller::{format_site, UNKNOWN_CALLER};
use crate::level::Level;
use crate::logger::Logger;

/// `tracing_subscriber` layer that forwards `tracing` events into a
/// [`Logger`], so libraries instrumented with `tracing` end up in the same
/// lines as direct calls.
///
/// The event message becomes the log message and its fields become one map
/// argument. The call site comes from the event metadata. `TRACE` is logged
/// as DEBUG. Events emitted by this crate itself are ignored.
pub struct KvLayer {
    target: Target,
    /// Events that passed the logger's threshold and were written.
    pub forwarded_events: Arc<AtomicU64>,
}

enum Target {
    Global,
    Shared(Arc<Logger>),
}

impl KvLayer {
    /// Forward into [`crate::global`].
    pub fn global() -> Self {
        Self::with_target(Target::Global)
    }

    /// Forward into `logger`.
    pub fn new(logger: Arc<Logger>) -> Self {
        Self::with_target(Target::Shared(logger))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            forwarded_events: Arc::new(AtomicU64::new(0)),
        }
    }

    fn logger(&self) -> &Logger {
        match &self.target {
            Target::Global => crate::init::global(),
            Target::Shared(logger) => logger,
        }
    }
}

impl<S> Layer<S> for KvLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }

        let level = map_level(meta.level());
        let logger = self.logger();
        if !logger.is_enabled(level) {
            return;
        }

        let mut visitor = ArgVisitor::default();
        event.record(&mut visitor);

        let caller = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => format_site(Path::new(file), line),
            _ => UNKNOWN_CALLER.to_string(),
        };

        let mut args = vec![visitor.message.unwrap_or_default()];
        if !visitor.fields.is_empty() {
            args.push(Arg::Map(visitor.fields));
        }

        logger.log_at(level, &caller, args);
        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
    }
}

fn is_own_target(target: &str) -> bool {
    target == "kvlog" || target.starts_with("kvlog::")
}

fn map_level(level: &tracing::Level) -> Level {
    if *level == tracing::Level::ERROR {
        Level::Error
    } else if *level == tracing::Level::WARN {
        Level::Warn
    } else if *level == tracing::Level::INFO {
        Level::Info
    } else {
        Level::Debug
    }
}

#[derive(Default)]
struct ArgVisitor {
    message: Option<Arg>,
    fields: Vec<(String, Arg)>,
}

impl ArgVisitor {
    fn put(&mut self, field: &Field, value: Arg) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for ArgVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Arg::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Arg::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Arg::Uint(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Arg::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Arg::Float(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Arg::error(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Arg::Str(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::layer::SubscriberExt;

    fn logger_to(path: &Path, level: &str) -> Arc<Logger> {
        let (logger, err) = Logger::new(Options {
            level: level.into(),
            format: "json".into(),
            output: "file".into(),
            file: path.to_str().unwrap().into(),
        });
        assert_eq!(err, None);
        Arc::new(logger)
    }

    #[test]
    fn forwards_events_with_fields_and_site() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bridge.log");
        let layer = KvLayer::new(logger_to(&path, "info"));
        let forwarded = Arc::clone(&layer.forwarded_events);
        let subscriber = tracing_subscriber::registry().with(layer);

        let line = tracing::subscriber::with_default(subscriber, || {
            let line = line!() + 1;
            tracing::warn!(target: "app", user = "bob", attempts = 3u64, id = "42", "login failed");
            tracing::debug!(target: "app", "not forwarded");
            line
        });

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(forwarded.load(Ordering::Relaxed), 1);

        let v: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["lv"], "WARN");
        assert_eq!(v["msg"], "login failed");
        assert_eq!(v["user"], "bob");
        assert_eq!(v["attempts"], 3);
        // Map arguments bypass raw-data extraction; JSON text is still promoted.
        assert_eq!(v["id"], 42);
        assert_eq!(v["caller"], format!("layer.rs:{}", line));
    }

    #[test]
    fn trace_maps_to_debug() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trace.log");
        let subscriber = tracing_subscriber::registry().with(KvLayer::new(logger_to(&path, "debug")));

        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!(target: "app", step = 1, "tracing detail");
        });

        let v: Value = serde_json::from_str(fs::read_to_string(&path).unwrap().trim()).unwrap();
        assert_eq!(v["lv"], "DEBUG");
        assert_eq!(v["step"], 1);
    }

    #[test]
    fn own_events_are_skipped() {
        assert!(is_own_target("kvlog"));
        assert!(is_own_target("kvlog::config"));
        assert!(!is_own_target("kvlogger"));
        assert!(!is_own_target("app::kvlog"));
    }
}
