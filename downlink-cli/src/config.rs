//! CLI-specific configuration structures for TOML-based scenario files.

use color_eyre::eyre::{Context, Result};
use downlink_core::config::{ChannelConfig, CodecConfig, FrameConfig, ReassemblyConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete CLI scenario bundle. Unlike the upstream tooling this was
/// adapted from, scenario files are flat: no `include` chain, since a
/// downlink scenario has no shared base layers to compose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownlinkScenario {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub reassembly: ReassemblyConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
}

impl Default for DownlinkScenario {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            channel: ChannelConfig::default(),
            reassembly: ReassemblyConfig::default(),
            codec: CodecConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

impl DownlinkScenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read scenario file: {}", path.display()))?;
        let scenario: Self =
            toml::from_str(&content).wrap_err("Failed to parse TOML scenario file")?;
        Ok(scenario)
    }
}

/// Terminal/demo interface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Number of simulated orbital passes to run before exiting.
    #[serde(default = "default_pass_count")]
    pub pass_count: usize,

    /// Steps per simulated pass (fed to `ScriptedOrbit::single_pass`).
    #[serde(default = "default_steps_per_pass")]
    pub steps_per_pass: usize,

    /// Peak elevation of the simulated pass, in degrees.
    #[serde(default = "default_max_elev_deg")]
    pub max_elev_deg: f64,

    /// Downlink data rate during the pass, in Mbps.
    #[serde(default = "default_rate_dl_mbps")]
    pub rate_dl_mbps: f64,

    /// PRNG seed for the RF channel model.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Dump each reassembled frame's fixed bytes to this directory, if set.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telemetry sampling interval in seconds.
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_secs: f64,
}

fn default_pass_count() -> usize {
    1
}

fn default_steps_per_pass() -> usize {
    50
}

fn default_max_elev_deg() -> f64 {
    60.0
}

fn default_rate_dl_mbps() -> f64 {
    20.0
}

fn default_seed() -> u64 {
    1
}

fn default_telemetry_interval() -> f64 {
    1.0
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            pass_count: default_pass_count(),
            steps_per_pass: default_steps_per_pass(),
            max_elev_deg: default_max_elev_deg(),
            rate_dl_mbps: default_rate_dl_mbps(),
            seed: default_seed(),
            output_dir: None,
            logging: LoggingConfig::default(),
            telemetry_interval_secs: default_telemetry_interval(),
        }
    }
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stdout
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            file_path: None,
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Convert CLI logging config to the core's ring-buffer log config.
    pub fn to_core_log_config(&self) -> downlink_core::logging::LogConfig {
        use downlink_core::logging::{LogConfig as CoreLogConfig, LogLevel as CoreLogLevel};

        let level = match self.level {
            LogLevel::Debug => CoreLogLevel::Debug,
            LogLevel::Info => CoreLogLevel::Info,
            LogLevel::Warn => CoreLogLevel::Warn,
            LogLevel::Error => CoreLogLevel::Error,
        };

        CoreLogConfig {
            level,
            enable_channel: true,
            enable_codec: true,
            enable_tx: true,
            enable_rx: true,
            enable_gc: true,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
