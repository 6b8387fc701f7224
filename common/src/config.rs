use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Host (and optional port) of the camera, e.g. "172.20.10.9".
    pub address: String,
    #[serde(default = "default_capture_path")]
    pub capture_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Number of frames kept in the rolling buffer.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// A pixel counts as changed when its intensity delta exceeds this.
    #[serde(default = "default_noise_floor")]
    pub noise_floor: u8,
    /// A detection fires when more than this many pixels changed.
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub on_detect: OnDetect,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

/// What the detector does with its buffer after a detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDetect {
    /// Leave the buffer as-is; the next tick compares the same pair again.
    #[default]
    Hold,
    /// Advance the buffer exactly as after a tick without change.
    Advance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            noise_floor: default_noise_floor(),
            pixel_threshold: default_pixel_threshold(),
            enabled: default_enabled(),
            on_detect: OnDetect::default(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_snapshot_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CameraConfig {
    /// Full URL of the single-still capture endpoint.
    pub fn capture_url(&self) -> String {
        let base = if self.address.contains("://") {
            self.address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.address.trim_end_matches('/'))
        };
        if self.capture_path.starts_with('/') {
            format!("{base}{}", self.capture_path)
        } else {
            format!("{base}/{}", self.capture_path)
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.address.trim().is_empty() {
            return Err(ConfigError::Invalid("camera.address must not be empty".into()));
        }
        if self.camera.timeout_secs == 0 {
            return Err(ConfigError::Invalid("camera.timeout_secs must be at least 1".into()));
        }
        if self.detection.capacity < 2 {
            return Err(ConfigError::Invalid(format!(
                "detection.capacity must be at least 2, got {}",
                self.detection.capacity
            )));
        }
        let interval = self.detection.poll_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "detection.poll_interval_secs must be positive, got {interval}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_capture_path() -> String {
    "/capture".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_capacity() -> usize {
    3
}
fn default_noise_floor() -> u8 {
    20
}
fn default_pixel_threshold() -> u64 {
    5000
}
fn default_enabled() -> bool {
    true
}
fn default_poll_interval() -> f64 {
    2.0
}
fn default_snapshot_dir() -> String {
    "snapshots".into()
}
fn default_log_level() -> String {
    "info".into()
}
