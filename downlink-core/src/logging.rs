//! Structured logging for the downlink core.
//!
//! Mirrors the level + subsystem filtered ring-buffer logger from the
//! upstream signal-processing tooling this crate was adapted from, retuned
//! to the subsystems this crate actually has: `CHANNEL`, `CODEC`, `TX`,
//! `RX`, `GC`.

use std::fmt;

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub enable_channel: bool,
    pub enable_codec: bool,
    pub enable_tx: bool,
    pub enable_rx: bool,
    pub enable_gc: bool,
    /// Maximum number of log entries to keep (for memory management)
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_channel: true,
            enable_codec: true,
            enable_tx: true,
            enable_rx: true,
            enable_gc: true,
            max_entries: 1000,
        }
    }
}

impl LogConfig {
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            max_entries: 100,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Error,
            max_entries: 0,
            ..Self::default()
        }
    }
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub message: String,
}

/// Logger that collects structured log entries
#[derive(Debug, Clone)]
pub struct DownlinkLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl DownlinkLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1000);
        Self {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        if level < self.config.level {
            return;
        }

        let enabled = match subsystem {
            "CHANNEL" => self.config.enable_channel,
            "CODEC" => self.config.enable_codec,
            "TX" => self.config.enable_tx,
            "RX" => self.config.enable_rx,
            "GC" => self.config.enable_gc,
            _ => true,
        };
        if !enabled {
            return;
        }

        let entry = LogEntry {
            level,
            subsystem,
            message: message.to_string(),
        };

        if self.config.max_entries > 0 {
            if self.entries.len() >= self.config.max_entries {
                self.entries.remove(0);
            }
            self.entries.push(entry);
        }

        #[cfg(any(test, debug_assertions))]
        {
            eprintln!("[{}] {}: {}", level, subsystem, message);
        }
    }

    pub fn trace(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, message);
    }

    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }

    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }

    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }

    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn entries_for_subsystem(&self, subsystem: &str) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.subsystem == subsystem).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for DownlinkLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Display for DownlinkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "[{}] {}: {}", entry.level, entry.subsystem, entry.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_level() {
        let mut logger = DownlinkLogger::new(LogConfig {
            level: LogLevel::Info,
            ..Default::default()
        });

        logger.trace("GC", "trace message");
        logger.debug("GC", "debug message");
        logger.info("GC", "info message");
        logger.warn("GC", "warn message");

        assert_eq!(logger.entries().len(), 2);
    }

    #[test]
    fn filters_by_subsystem() {
        let mut logger = DownlinkLogger::new(LogConfig {
            level: LogLevel::Debug,
            enable_channel: false,
            ..Default::default()
        });

        logger.info("CHANNEL", "dropped");
        logger.info("RX", "completed");

        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].subsystem, "RX");
    }

    #[test]
    fn respects_max_entries() {
        let mut logger = DownlinkLogger::new(LogConfig {
            max_entries: 2,
            ..Default::default()
        });

        logger.info("GC", "one");
        logger.info("GC", "two");
        logger.info("GC", "three");

        assert_eq!(logger.entries().len(), 2);
        assert!(logger.entries()[0].message.contains("two"));
    }
}
