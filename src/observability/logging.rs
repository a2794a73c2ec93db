//! JSON-line logging for the store.
//!
//! Every emitted line goes to a [`LogSink`] and is also kept in a short
//! in-memory tail, so recent activity can be inspected without reading the
//! sink back.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Lines kept in the in-memory tail unless overridden.
pub const DEFAULT_LOG_TAIL: usize = 256;

/// Severity levels, ordered so a threshold filters everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(LoggingError::UnknownLevel(value.to_string())),
        }
    }
}

/// Size-based rotation for file sinks: once the active file would pass
/// `max_bytes` it is renamed to `<path>.1`, older segments shift up, and at
/// most `max_files` rotated segments are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 64 << 20,
            max_files: 4,
        }
    }
}

/// Where log lines are written, as named in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    /// Only the in-memory tail.
    Discard,
    #[default]
    Stderr,
    /// Append to a file, rotated per [`LogRotationPolicy`].
    File(PathBuf),
}

/// Destination for emitted lines.
pub enum LogSink {
    Discard,
    Stderr,
    File(RotatingFile),
    Writer(Box<dyn Write + Send>),
}

impl LogSink {
    pub fn open(target: &LogTarget, policy: LogRotationPolicy) -> Result<Self, LoggingError> {
        Ok(match target {
            LogTarget::Discard => LogSink::Discard,
            LogTarget::Stderr => LogSink::Stderr,
            LogTarget::File(path) => LogSink::File(RotatingFile::open(path, policy)?),
        })
    }

    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        LogSink::Writer(Box::new(writer))
    }

    fn write_line(&mut self, line: &str) -> Result<(), LoggingError> {
        match self {
            LogSink::Discard => Ok(()),
            LogSink::Stderr => writeln!(io::stderr().lock(), "{line}").map_err(LoggingError::Write),
            LogSink::File(file) => file.write_line(line),
            LogSink::Writer(writer) => writeln!(writer, "{line}").map_err(LoggingError::Write),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Discard => f.write_str("Discard"),
            LogSink::Stderr => f.write_str("Stderr"),
            LogSink::File(file) => f.debug_tuple("File").field(&file.path).finish(),
            LogSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Append-only JSON-lines file with size-based rotation.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    policy: LogRotationPolicy,
    file: File,
    bytes_written: u64,
}

impl RotatingFile {
    /// Opens `path` for append, continuing from its current size.
    pub fn open(path: impl AsRef<Path>, policy: LogRotationPolicy) -> Result<Self, LoggingError> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        let bytes_written = file
            .metadata()
            .map_err(|source| LoggingError::Open {
                path: path.clone(),
                source,
            })?
            .len();
        Ok(Self {
            path,
            policy,
            file,
            bytes_written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`-th rotated segment (`<path>.<index>`).
    pub fn segment_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn write_line(&mut self, line: &str) -> Result<(), LoggingError> {
        let len = line.len() as u64 + 1;
        if self.bytes_written > 0 && self.bytes_written + len > self.policy.max_bytes {
            self.rotate()?;
        }
        writeln!(self.file, "{line}").map_err(LoggingError::Write)?;
        self.bytes_written += len;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), LoggingError> {
        self.file.flush().map_err(LoggingError::Write)?;
        for index in (1..self.policy.max_files).rev() {
            let from = self.segment_path(index);
            if from.exists() {
                fs::rename(&from, self.segment_path(index + 1)).map_err(LoggingError::Write)?;
            }
        }
        fs::rename(&self.path, self.segment_path(1)).map_err(LoggingError::Write)?;
        self.file = open_append(&self.path)?;
        self.bytes_written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Level-filtered JSON-line logger.
#[derive(Debug)]
pub struct JsonLineLogger {
    sink: LogSink,
    level: LogLevel,
    tail: VecDeque<String>,
    tail_capacity: usize,
}

impl JsonLineLogger {
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            level: LogLevel::Info,
            tail: VecDeque::new(),
            tail_capacity: DEFAULT_LOG_TAIL,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_tail(mut self, capacity: usize) -> Self {
        self.tail_capacity = capacity;
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Formats one entry and hands it to the sink. The tail keeps the line
    /// even when the sink fails.
    pub fn log(
        &mut self,
        ts: &str,
        level: LogLevel,
        module: &str,
        point_id: &str,
        sequence: u64,
        message: &str,
    ) -> Result<(), LoggingError> {
        if !self.enabled(level) {
            return Ok(());
        }
        let line = serde_json::to_string(&LogRecord {
            ts,
            level: level.as_str(),
            module,
            point_id,
            sequence,
            message,
        })
        .map_err(LoggingError::Serialize)?;
        if self.tail_capacity > 0 {
            if self.tail.len() == self.tail_capacity {
                self.tail.pop_front();
            }
            self.tail.push_back(line.clone());
        }
        self.sink.write_line(&line)
    }

    /// Most recent lines, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &String> {
        self.tail.iter()
    }
}

impl Default for JsonLineLogger {
    fn default() -> Self {
        Self::new(LogSink::Discard)
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write log line: {0}")]
    Write(#[source] io::Error),
}

#[derive(Serialize)]
struct LogRecord<'a> {
    ts: &'a str,
    level: &'a str,
    module: &'a str,
    point_id: &'a str,
    sequence: u64,
    message: &'a str,
}
