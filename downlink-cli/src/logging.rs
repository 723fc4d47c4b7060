//! Structured logging for the CLI demo: pass progress, telemetry rollups,
//! and frame-completion events.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types emitted by the CLI demo loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Link telemetry rollup, sampled at `telemetry_interval_secs`.
    Telemetry(TelemetryEvent),

    /// A frame finished reassembling.
    FrameComplete(FrameCompleteEvent),

    /// End-of-run statistical summary.
    Statistics(StatisticsEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub drop_rate: f64,
    pub corruption_rate: f64,
    pub duplicate_rate: f64,
    pub fade_activations: usize,
    pub datagrams_sent: usize,
    pub datagrams_delivered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameCompleteEvent {
    pub timestamp: DateTime<Utc>,
    pub frame_id: u64,
    pub noisy_bytes: usize,
    pub fixed_bytes: usize,
    pub corrected_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub drop_rate: StatSummary,
    pub corruption_rate: StatSummary,
    pub frames_completed: usize,
    pub frames_timed_out: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Logger that writes structured log events to stdout, stderr, or a file.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("file path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Telemetry(t) => format!(
                "ts=\"{}\" type=telemetry drop_rate={:.4} corruption_rate={:.4} duplicate_rate={:.4} fades={} sent={} delivered={}",
                ts, t.drop_rate, t.corruption_rate, t.duplicate_rate, t.fade_activations, t.datagrams_sent, t.datagrams_delivered
            ),
            LogEvent::FrameComplete(f) => format!(
                "ts=\"{}\" type=frame_complete frame_id={} noisy_bytes={} fixed_bytes={} corrected_bytes={}",
                ts, f.frame_id, f.noisy_bytes, f.fixed_bytes, f.corrected_bytes
            ),
            LogEvent::Statistics(s) => format!(
                "ts=\"{}\" type=statistics duration_secs={:.2} frames_completed={} frames_timed_out={} drop_rate_mean={:.4}",
                ts, s.duration_secs, s.frames_completed, s.frames_timed_out, s.drop_rate.mean
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d),
                None => format!("ts=\"{}\" level=error msg=\"{}\"", ts, message),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Telemetry(t) => format!(
                "[{}] TELEMETRY: drop={:.2}% corrupt={:.2}% dup={:.2}% | fades={} | sent={} delivered={}",
                ts,
                t.drop_rate * 100.0,
                t.corruption_rate * 100.0,
                t.duplicate_rate * 100.0,
                t.fade_activations,
                t.datagrams_sent,
                t.datagrams_delivered
            ),
            LogEvent::FrameComplete(f) => format!(
                "[{}] FRAME[{}]: {} bytes noisy, {} bytes fixed, {} bytes corrected",
                ts, f.frame_id, f.noisy_bytes, f.fixed_bytes, f.corrected_bytes
            ),
            LogEvent::Statistics(s) => format!(
                "[{}] STATISTICS ({:.2}s): frames completed={} timed_out={} | drop rate: μ={:.4} σ={:.4} [{:.4},{:.4}]",
                ts,
                s.duration_secs,
                s.frames_completed,
                s.frames_timed_out,
                s.drop_rate.mean,
                s.drop_rate.stddev,
                s.drop_rate.min,
                s.drop_rate.max
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{}] ERROR: {} | {}", ts, message, d),
                None => format!("[{}] ERROR: {}", ts, message),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
