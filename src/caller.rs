use std::path::Path;

/// Returned when no frame outside the logger could be found.
pub const UNKNOWN_CALLER: &str = "???:0";

/// Symbol path prefixes treated as logger or runtime plumbing by default.
pub const DEFAULT_INTERNAL_PREFIXES: &[&str] = &[
    "kvlog::",
    "backtrace::",
    "std::",
    "core::",
    "alloc::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
];

/// Produces the `<file basename>:<line>` of the code that issued a log call.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self) -> String;
}

impl<F> CallerResolver for F
where
    F: Fn() -> String + Send + Sync,
{
    fn resolve(&self) -> String {
        self()
    }
}

/// One resolved stack frame, as seen by the "is internal" predicate.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Demangled symbol path without hash, empty when unknown.
    pub symbol: &'a str,
    pub file: Option<&'a Path>,
    pub line: Option<u32>,
}

type Predicate = dyn Fn(&Frame<'_>) -> bool + Send + Sync;

/// Walks the current stack and returns the first frame the predicate does
/// not claim as internal.
///
/// Frames are checked one by one, so the number of wrapper layers between
/// the call site and the resolver does not matter. Inlined functions are
/// checked innermost first.
pub struct StackResolver {
    is_internal: Box<Predicate>,
    max_depth: usize,
}

impl StackResolver {
    pub fn new() -> Self {
        Self::with_prefixes(DEFAULT_INTERNAL_PREFIXES.iter().copied())
    }

    /// Treat frames whose symbol path starts with any of `prefixes` as internal.
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::with_predicate(move |frame| symbol_in(frame.symbol, &prefixes))
    }

    /// Default prefixes plus `extra`, for crates that wrap this logger.
    pub fn with_extra_prefixes<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = DEFAULT_INTERNAL_PREFIXES
            .iter()
            .map(|p| p.to_string())
            .chain(extra.into_iter().map(Into::into));
        Self::with_prefixes(prefixes)
    }

    pub fn with_predicate(is_internal: impl Fn(&Frame<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self {
            is_internal: Box::new(is_internal),
            max_depth: 64,
        }
    }

    /// Limit on the number of frames captured per call.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }
}

impl Default for StackResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerResolver for StackResolver {
    fn resolve(&self) -> String {
        let mut frames = Vec::with_capacity(32);
        backtrace::trace(|frame| {
            frames.push(frame.clone());
            frames.len() < self.max_depth
        });

        for frame in &frames {
            let mut site = None;
            backtrace::resolve_frame(frame, |symbol| {
                if site.is_some() {
                    return;
                }
                let name = symbol
                    .name()
                    .map(|n| format!("{:#}", n))
                    .unwrap_or_default();
                let view = Frame {
                    symbol: &name,
                    file: symbol.filename(),
                    line: symbol.lineno(),
                };
                if (self.is_internal)(&view) {
                    return;
                }
                if let (Some(file), Some(line)) = (view.file, view.line) {
                    site = Some(format_site(file, line));
                }
            });
            if let Some(site) = site {
                return site;
            }
        }

        UNKNOWN_CALLER.to_string()
    }
}

/// `<basename>:<line>`.
pub fn format_site(file: &Path, line: u32) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| file.to_string_lossy());
    format!("{}:{}", name, line)
}

/// Whether `symbol` names an item under one of `prefixes`, looking through
/// the `<`, `&` and `dyn ` that lead qualified trait-impl paths.
fn symbol_in(symbol: &str, prefixes: &[String]) -> bool {
    let path = symbol
        .trim_start_matches(|c: char| c == '<' || c == '&' || c == '*')
        .trim_start_matches("mut ")
        .trim_start_matches("const ")
        .trim_start_matches("dyn ");
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}
