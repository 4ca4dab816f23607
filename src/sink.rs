use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;

/// One output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Stdout,
    Stderr,
    File,
}

impl Destination {
    /// Fixed order in which destinations are assembled.
    pub const ALL: [Destination; 3] = [Destination::Stdout, Destination::Stderr, Destination::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Stdout => "stdout",
            Destination::Stderr => "stderr",
            Destination::File => "file",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Destination::Stdout),
            "stderr" => Ok(Destination::Stderr),
            "file" => Ok(Destination::File),
            _ => Err(ConfigError::UnknownDestination(s.to_string())),
        }
    }
}

/// Set of destinations. Iterates in the order stdout, stderr, file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Destinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl Destinations {
    pub const fn empty() -> Self {
        Self { stdout: false, stderr: false, file: false }
    }

    pub fn only(dest: Destination) -> Self {
        let mut set = Self::empty();
        set.insert(dest);
        set
    }

    pub fn insert(&mut self, dest: Destination) {
        *self.slot(dest) = true;
    }

    pub fn remove(&mut self, dest: Destination) {
        *self.slot(dest) = false;
    }

    pub fn contains(&self, dest: Destination) -> bool {
        match dest {
            Destination::Stdout => self.stdout,
            Destination::Stderr => self.stderr,
            Destination::File => self.file,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.stdout || self.stderr || self.file)
    }

    pub fn iter(&self) -> impl Iterator<Item = Destination> + '_ {
        Destination::ALL.into_iter().filter(|d| self.contains(*d))
    }

    /// Parse a `+`-joined destination spec such as `stderr+file`.
    ///
    /// An empty spec selects `file` alone when `file_path` is set and `stderr`
    /// otherwise. An unknown token forces `stderr`. Selecting `file` without a
    /// path is reported, but `file` stays selected. The returned set is always
    /// the one to apply, error or not.
    pub fn parse(spec: &str, file_path: &str) -> (Destinations, Option<ConfigError>) {
        let spec = spec.trim();
        let has_path = !file_path.trim().is_empty();

        if spec.is_empty() {
            let dest = if has_path { Destination::File } else { Destination::Stderr };
            return (Self::only(dest), None);
        }

        let mut set = Self::empty();
        for token in spec.split('+') {
            if token.trim().is_empty() {
                continue;
            }
            match token.parse::<Destination>() {
                Ok(dest) => set.insert(dest),
                Err(e) => return (Self::only(Destination::Stderr), Some(e)),
            }
        }

        if set.contains(Destination::File) && !has_path {
            return (set, Some(ConfigError::MissingFilePath));
        }
        (set, None)
    }

    fn slot(&mut self, dest: Destination) -> &mut bool {
        match dest {
            Destination::Stdout => &mut self.stdout,
            Destination::Stderr => &mut self.stderr,
            Destination::File => &mut self.file,
        }
    }
}

impl FromIterator<Destination> for Destinations {
    fn from_iter<I: IntoIterator<Item = Destination>>(iter: I) -> Self {
        let mut set = Self::empty();
        for dest in iter {
            set.insert(dest);
        }
        set
    }
}

/// `stdout+stderr+file` style rendering.
impl fmt::Display for Destinations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dest) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(dest.as_str())?;
        }
        Ok(())
    }
}

/// Synchronous destination for rendered log lines.
///
/// `write_line` receives the full line including its trailing newline and is
/// expected to write it unbuffered in one call.
pub trait LineSink: Send + Sync {
    fn destination(&self) -> Destination;

    fn write_line(&self, line: &[u8]) -> io::Result<()>;
}

/// Process standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn destination(&self) -> Destination {
        Destination::Stdout
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(line)
    }
}

/// Process standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LineSink for StderrSink {
    fn destination(&self) -> Destination {
        Destination::Stderr
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(line)
    }
}

/// Append-only log file. Closing it releases the handle even while other
/// holders of the sink are alive; later writes fail.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// Create missing parent directories, then open `path` for append.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // Open reports the real problem if this fails.
            let _ = fs::create_dir_all(parent);
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Close the handle. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.file.lock().take().is_some()
    }
}

impl LineSink for FileSink {
    fn destination(&self) -> Destination {
        Destination::File
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        match self.file.lock().as_mut() {
            Some(file) => file.write_all(line),
            None => Err(io::Error::new(io::ErrorKind::Other, "log file is closed")),
        }
    }
}

/// Writer duplicating every line to each member sink.
///
/// Never empty: constructing one from no sinks yields stderr alone. Writes are
/// not atomic across members and member errors are dropped.
pub struct FanOut {
    sinks: Vec<Arc<dyn LineSink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<Arc<dyn LineSink>>) -> Self {
        if sinks.is_empty() {
            return Self::stderr();
        }
        Self { sinks }
    }

    pub fn stderr() -> Self {
        Self { sinks: vec![Arc::new(StderrSink)] }
    }

    /// Same members minus every sink writing to `dest`.
    pub fn without(&self, dest: Destination) -> Self {
        Self::new(
            self.sinks
                .iter()
                .filter(|s| s.destination() != dest)
                .cloned()
                .collect(),
        )
    }

    /// Destinations actually written to.
    pub fn destinations(&self) -> Destinations {
        self.sinks.iter().map(|s| s.destination()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Write `line` plus a newline to every member.
    pub fn write_line(&self, line: &str) {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        for sink in &self.sinks {
            let _ = sink.write_line(&buf);
        }
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("destinations", &self.destinations().to_string())
            .finish()
    }
}
