//! Viewer configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/gx-viewer.toml` (or a path given on the command line)
//! 2. Environment variables prefixed with `GX_VIEWER_`, nested keys
//!    separated by `__` (e.g. `GX_VIEWER_APPLICATION__LOG_LEVEL=debug`)
//!
//! Every section has defaults, so an empty or missing file yields a usable
//! configuration with no sessions.
//!
//! # Example
//! ```no_run
//! use gx_viewer::config::ViewerConfig;
//!
//! let config = ViewerConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use gx_core::{GxError, TriggerMode, TriggerSource};
use gx_driver_mock::MockSdkConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/gx-viewer.toml";

/// Sessions a single viewer drives at most
pub const MAX_SESSIONS: usize = 2;

/// Top-level viewer configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewerConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Timing of the acquisition and presentation loops
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Cameras to open, in display order
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    /// Simulated cameras
    #[serde(default)]
    pub mock: MockSdkConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// Loop timing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// Upper bound of one dequeue wait in milliseconds
    #[serde(default = "default_dequeue_timeout")]
    pub dequeue_timeout_ms: u64,
    /// Device discovery timeout in milliseconds
    #[serde(default = "default_enumerate_timeout")]
    pub enumerate_timeout_ms: u64,
    /// Display refresh period in milliseconds
    #[serde(default = "default_show_interval")]
    pub show_interval_ms: u64,
    /// Frame rate reporting period in milliseconds
    #[serde(default = "default_frame_rate_interval")]
    pub frame_rate_interval_ms: u64,
}

/// One camera session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 1-based device index in enumeration order
    pub device_index: u32,
    /// Trigger mode applied after open
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    /// Trigger source applied after open
    #[serde(default)]
    pub trigger_source: TriggerSource,
    /// Where "save image" writes; the extension selects the format
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

// Default value functions
fn default_name() -> String {
    "gx-viewer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dequeue_timeout() -> u64 {
    gx_core::limits::DEQUEUE_TIMEOUT.as_millis() as u64
}

fn default_enumerate_timeout() -> u64 {
    gx_core::limits::ENUMERATE_TIMEOUT.as_millis() as u64
}

fn default_show_interval() -> u64 {
    gx_core::limits::SHOW_IMAGE_INTERVAL.as_millis() as u64
}

fn default_frame_rate_interval() -> u64 {
    gx_core::limits::FRAME_RATE_INTERVAL.as_millis() as u64
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_ms: default_dequeue_timeout(),
            enumerate_timeout_ms: default_enumerate_timeout(),
            show_interval_ms: default_show_interval(),
            frame_rate_interval_ms: default_frame_rate_interval(),
        }
    }
}

impl AcquisitionConfig {
    /// Dequeue wait as a `Duration`
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    /// Enumeration timeout as a `Duration`
    pub fn enumerate_timeout(&self) -> Duration {
        Duration::from_millis(self.enumerate_timeout_ms)
    }

    /// Display refresh period as a `Duration`
    pub fn show_interval(&self) -> Duration {
        Duration::from_millis(self.show_interval_ms)
    }

    /// Frame rate reporting period as a `Duration`
    pub fn frame_rate_interval(&self) -> Duration {
        Duration::from_millis(self.frame_rate_interval_ms)
    }
}

impl SessionConfig {
    /// Session for `device_index` with free-running acquisition.
    pub fn new(device_index: u32) -> Self {
        Self {
            device_index,
            trigger_mode: TriggerMode::default(),
            trigger_source: TriggerSource::default(),
            snapshot_path: None,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("GX_VIEWER_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), GxError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(GxError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let intervals = [
            ("dequeue_timeout_ms", self.acquisition.dequeue_timeout_ms),
            ("enumerate_timeout_ms", self.acquisition.enumerate_timeout_ms),
            ("show_interval_ms", self.acquisition.show_interval_ms),
            ("frame_rate_interval_ms", self.acquisition.frame_rate_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(GxError::Configuration(format!("{} must be greater than 0", name)));
        }

        if self.sessions.len() > MAX_SESSIONS {
            return Err(GxError::Configuration(format!(
                "{} sessions configured, at most {} are supported",
                self.sessions.len(),
                MAX_SESSIONS
            )));
        }

        let mut indices = HashSet::new();
        for session in &self.sessions {
            if session.device_index == 0 {
                return Err(GxError::Configuration(
                    "device_index is 1-based, 0 is not a device".to_string(),
                ));
            }
            if !indices.insert(session.device_index) {
                return Err(GxError::Configuration(format!(
                    "Duplicate device_index: {}",
                    session.device_index
                )));
            }
        }

        for device in &self.mock.devices {
            let rates = [
                ("frame_loss_rate", device.frame_loss_rate),
                ("truncated_frame_rate", device.truncated_frame_rate),
            ];
            if let Some((name, rate)) = rates.iter().find(|(_, r)| !(0.0..=1.0).contains(r)) {
                return Err(GxError::Configuration(format!(
                    "Mock device {} {} {} is outside 0.0-1.0",
                    device.serial_number, name, rate
                )));
            }
        }

        Ok(())
    }
}
