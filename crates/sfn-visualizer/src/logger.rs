//! Diagnostic logging facade.
//!
//! The manager never logs through a global: it owns an `Arc<dyn Logger>`
//! handed to it at construction. [`ToolkitLogger`] is the full facade with
//! runtime-added sinks, a runtime-adjustable threshold and a terminal
//! shutdown; [`TracingLogger`] forwards into `tracing`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{LoggerError, LoggerResult};

/// Severity, most severe first. A threshold enables itself and everything
/// more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }

    /// Whether a record at `level` passes this threshold.
    pub fn enables(self, level: LogLevel) -> bool {
        level <= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!(
                "unknown log level '{other}' (expected error, warn, info, verbose, debug)"
            )),
        }
    }
}

/// Either a plain message or an error value.
#[derive(Clone, Copy)]
pub enum LogMessage<'a> {
    Text(&'a str),
    Error(&'a (dyn std::error::Error + 'a)),
}

impl<'a> LogMessage<'a> {
    pub fn error(err: &'a (dyn std::error::Error + 'a)) -> Self {
        LogMessage::Error(err)
    }
}

impl<'a> From<&'a str> for LogMessage<'a> {
    fn from(text: &'a str) -> Self {
        LogMessage::Text(text)
    }
}

impl<'a> From<&'a String> for LogMessage<'a> {
    fn from(text: &'a String) -> Self {
        LogMessage::Text(text)
    }
}

impl fmt::Display for LogMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogMessage::Text(text) => f.write_str(text),
            LogMessage::Error(err) => {
                let mut shown = err.to_string();
                f.write_str(&shown)?;
                let mut source = err.source();
                while let Some(cause) = source {
                    let text = cause.to_string();
                    // Wrappers such as `IO error: {0}` already print their cause.
                    if !shown.ends_with(&text) {
                        write!(f, "\n  caused by: {text}")?;
                    }
                    shown = text;
                    source = cause.source();
                }
                Ok(())
            }
        }
    }
}

/// Structured key/value metadata attached to a record.
pub type Fields<'a> = &'a [(&'a str, &'a dyn fmt::Display)];

/// Leveled diagnostic sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: LogMessage<'_>, fields: Fields<'_>) -> LoggerResult<()>;
}

/// Level shorthands for any [`Logger`].
pub trait LoggerExt: Logger {
    fn debug<'a>(&self, message: impl Into<LogMessage<'a>>) -> LoggerResult<()> {
        self.log(LogLevel::Debug, message.into(), &[])
    }

    fn verbose<'a>(&self, message: impl Into<LogMessage<'a>>) -> LoggerResult<()> {
        self.log(LogLevel::Verbose, message.into(), &[])
    }

    fn info<'a>(&self, message: impl Into<LogMessage<'a>>) -> LoggerResult<()> {
        self.log(LogLevel::Info, message.into(), &[])
    }

    fn warn<'a>(&self, message: impl Into<LogMessage<'a>>) -> LoggerResult<()> {
        self.log(LogLevel::Warn, message.into(), &[])
    }

    fn error<'a>(&self, message: impl Into<LogMessage<'a>>) -> LoggerResult<()> {
        self.log(LogLevel::Error, message.into(), &[])
    }
}

impl<T: Logger + ?Sized> LoggerExt for T {}

/// A UI output surface that receives formatted log lines.
pub trait OutputChannel: Send + Sync {
    fn append_line(&self, line: &str);
}

enum Sink {
    File(File),
    Console,
    Channel(Arc<dyn OutputChannel>),
}

impl Sink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        match self {
            Sink::File(file) => writeln!(file, "{line}"),
            Sink::Console => writeln!(std::io::stderr().lock(), "{line}"),
            Sink::Channel(channel) => {
                channel.append_line(line);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::File(file) => file.flush(),
            Sink::Console => std::io::stderr().lock().flush(),
            Sink::Channel(_) => Ok(()),
        }
    }
}

struct LoggerState {
    level: LogLevel,
    sinks: Vec<Sink>,
    disposed: bool,
}

/// Multi-sink logger with a runtime threshold and a terminal shutdown.
///
/// Starts with no sinks; records below the threshold are dropped, records
/// with no sinks go nowhere. After [`ToolkitLogger::shutdown`] every write and
/// every reconfiguration fails with [`LoggerError::Disposed`].
pub struct ToolkitLogger {
    state: Mutex<LoggerState>,
}

impl ToolkitLogger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            state: Mutex::new(LoggerState {
                level,
                sinks: Vec::new(),
                disposed: false,
            }),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.state.lock().level
    }

    /// Change the threshold. The change is announced on every sink
    /// regardless of either threshold.
    pub fn set_log_level(&self, level: LogLevel) -> LoggerResult<()> {
        let mut state = self.live_state()?;
        let current = state.level;
        write_all(
            &mut state.sinks,
            &format_line(current, LogMessage::Text(&format!("Setting log level to: {level}")), &[]),
        )?;
        state.level = level;
        write_all(
            &mut state.sinks,
            &format_line(level, LogMessage::Text(&format!("Log level is now: {level}")), &[]),
        )
    }

    /// Append records to the file at `path`, creating it and its parent
    /// directories if needed.
    pub fn log_to_file(&self, path: &Path) -> LoggerResult<()> {
        let mut state = self.live_state()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        state.sinks.push(Sink::File(file));
        Ok(())
    }

    /// Write records to stderr.
    pub fn log_to_console(&self) -> LoggerResult<()> {
        self.live_state()?.sinks.push(Sink::Console);
        Ok(())
    }

    pub fn log_to_output_channel(&self, channel: Arc<dyn OutputChannel>) -> LoggerResult<()> {
        self.live_state()?.sinks.push(Sink::Channel(channel));
        Ok(())
    }

    pub fn sink_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().disposed
    }

    /// Flush and release every sink. Safe to call more than once.
    pub fn shutdown(&self) -> LoggerResult<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Ok(());
        }
        state.disposed = true;

        let mut first_error = None;
        for mut sink in state.sinks.drain(..) {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn live_state(&self) -> LoggerResult<parking_lot::MutexGuard<'_, LoggerState>> {
        let state = self.state.lock();
        if state.disposed {
            return Err(LoggerError::Disposed);
        }
        Ok(state)
    }
}

impl Logger for ToolkitLogger {
    fn log(&self, level: LogLevel, message: LogMessage<'_>, fields: Fields<'_>) -> LoggerResult<()> {
        let mut state = self.live_state()?;
        if !state.level.enables(level) || state.sinks.is_empty() {
            return Ok(());
        }
        let line = format_line(level, message, fields);
        write_all(&mut state.sinks, &line)
    }
}

impl Drop for ToolkitLogger {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Failed to flush log sinks on drop: {e}");
        }
    }
}

/// Forwards records to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: LogMessage<'_>, fields: Fields<'_>) -> LoggerResult<()> {
        let text = with_fields(message, fields);
        match level {
            LogLevel::Error => tracing::error!("{text}"),
            LogLevel::Warn => tracing::warn!("{text}"),
            LogLevel::Info => tracing::info!("{text}"),
            LogLevel::Verbose => tracing::debug!("{text}"),
            LogLevel::Debug => tracing::trace!("{text}"),
        }
        Ok(())
    }
}

fn write_all(sinks: &mut [Sink], line: &str) -> LoggerResult<()> {
    let mut first_error = None;
    for sink in sinks.iter_mut() {
        if let Err(e) = sink.write_line(line) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn with_fields(message: LogMessage<'_>, fields: Fields<'_>) -> String {
    let mut text = message.to_string();
    for (key, value) in fields {
        text.push_str(&format!(" {key}={value}"));
    }
    text
}

fn format_line(level: LogLevel, message: LogMessage<'_>, fields: Fields<'_>) -> String {
    format!(
        "{} [{}]: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        level.as_str().to_ascii_uppercase(),
        with_fields(message, fields)
    )
}
