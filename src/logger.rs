use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Number of entries kept in the in-memory log buffer
const LOG_CAPACITY: usize = 1000;

/// Log level enum for type-safe logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// A single buffered log record
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Module tag such as `"pipeline"` or `"batch"`
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// Fixed-size ring of log entries, oldest overwritten first
struct CircularBuffer {
    buffer: Vec<LogEntry>,
    head: usize,
    capacity: usize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    fn push(&mut self, item: LogEntry) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn to_vec(&self) -> Vec<LogEntry> {
        let mut result = Vec::with_capacity(self.buffer.len());
        result.extend_from_slice(&self.buffer[self.head..]);
        result.extend_from_slice(&self.buffer[..self.head]);
        result
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
    }
}

enum LogCommand {
    Log(LogEntry),
    GetLogs(Sender<Vec<LogEntry>>),
    Clear,
}

/// Non-blocking logger that keeps recent entries in memory and mirrors
/// every entry to `tracing`
pub struct Logger {
    sender: Sender<LogCommand>,
    min_level: Arc<AtomicU8>,
}

impl Logger {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(LOG_CAPACITY);
        let min_level = Arc::new(AtomicU8::new(LogLevel::Debug as u8));

        std::thread::spawn(move || {
            Self::logger_thread(receiver);
        });

        Self { sender, min_level }
    }

    fn logger_thread(receiver: Receiver<LogCommand>) {
        let mut buffer = CircularBuffer::new(LOG_CAPACITY);

        for cmd in receiver {
            match cmd {
                LogCommand::Log(entry) => buffer.push(entry),
                LogCommand::GetLogs(response_tx) => {
                    let _ = response_tx.send(buffer.to_vec());
                }
                LogCommand::Clear => buffer.clear(),
            }
        }
    }

    /// Record a message (non-blocking; dropped if the channel is full)
    pub fn log(&self, level: LogLevel, message: &str, source: &'static str) {
        self.record(level, message, source, None);
    }

    /// Record a message with structured context
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: &str,
        source: &'static str,
        context: HashMap<String, serde_json::Value>,
    ) {
        self.record(level, message, source, Some(context));
    }

    fn record(
        &self,
        level: LogLevel,
        message: &str,
        source: &'static str,
        context: Option<HashMap<String, serde_json::Value>>,
    ) {
        if (level as u8) < self.min_level.load(Ordering::Relaxed) {
            return;
        }

        match level {
            LogLevel::Debug => tracing::debug!(target: "webperfect", source, "{}", message),
            LogLevel::Info => tracing::info!(target: "webperfect", source, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "webperfect", source, "{}", message),
            LogLevel::Error => tracing::error!(target: "webperfect", source, "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            source,
            context,
        };

        let _ = self.sender.try_send(LogCommand::Log(entry));
    }

    /// Set minimum log level (runtime filtering)
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Snapshot of buffered entries in chronological order
    pub fn get_logs(&self) -> Vec<LogEntry> {
        let (response_tx, response_rx) = bounded(1);
        if self.sender.send(LogCommand::GetLogs(response_tx)).is_ok() {
            response_rx.recv().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    pub fn clear_logs(&self) {
        let _ = self.sender.try_send(LogCommand::Clear);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

// Global logger instance
lazy_static::lazy_static! {
    pub static ref LOGGER: Logger = Logger::new();
}

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
