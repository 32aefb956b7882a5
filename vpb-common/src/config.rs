//! Configuration loading and resolution
//!
//! Resolution priority order:
//! 1. Environment variable (`VPB_CONFIG` pointing at a TOML file)
//! 2. Platform config file (`~/.config/vpb/config.toml` or the OS
//!    equivalent)
//! 3. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PROGRESS_POLL_MS: u64 = 1_000;
const DEFAULT_SEGMENT_POLL_MS: u64 = 1_000;
const DEFAULT_SEGMENT_WINDOW_MS: u64 = 3_000;
const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;

/// Bridge configuration
///
/// All intervals are milliseconds in the file; accessors expose `Duration`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Progress poll cadence (position/chapter updates)
    pub progress_poll_ms: u64,

    /// Segment poll cadence
    pub segment_poll_ms: u64,

    /// Width of the trigger window starting at each segment's start time.
    /// Must exceed `segment_poll_ms` or segment starts can be sampled past.
    pub segment_window_ms: u64,

    /// Event bus channel capacity
    pub event_bus_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            progress_poll_ms: DEFAULT_PROGRESS_POLL_MS,
            segment_poll_ms: DEFAULT_SEGMENT_POLL_MS,
            segment_window_ms: DEFAULT_SEGMENT_WINDOW_MS,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Load configuration following the documented priority order
    ///
    /// A missing file falls through to the next priority level; a present
    /// but malformed file is reported (the caller decides whether to fall
    /// back to defaults).
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("VPB_CONFIG") {
            let config = Self::from_file(PathBuf::from(path))?;
            return config.validated();
        }

        if let Some(path) = platform_config_path() {
            if path.exists() {
                let config = Self::from_file(path)?;
                return config.validated();
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<BridgeConfig>(content)
            .map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    /// Validate interval relationships, returning self on success
    pub fn validated(self) -> Result<Self> {
        if self.segment_window_ms <= self.segment_poll_ms {
            return Err(Error::Config(format!(
                "segment_window_ms ({}) must exceed segment_poll_ms ({})",
                self.segment_window_ms, self.segment_poll_ms
            )));
        }
        if self.progress_poll_ms == 0 || self.segment_poll_ms == 0 {
            return Err(Error::Config("poll intervals must be non-zero".to_string()));
        }
        Ok(self)
    }

    /// Progress poll cadence as a `Duration`
    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    /// Segment poll cadence as a `Duration`
    pub fn segment_poll_interval(&self) -> Duration {
        Duration::from_millis(self.segment_poll_ms)
    }

    /// Segment trigger window as a `Duration`
    pub fn segment_window(&self) -> Duration {
        Duration::from_millis(self.segment_window_ms)
    }
}

/// Get the platform-dependent config file path
fn platform_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir().map(|d| d.join("vpb").join("config.toml"));
    if path.is_none() {
        warn!("Could not determine platform config directory");
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.progress_poll_ms, 1_000);
        assert_eq!(config.segment_poll_ms, 1_000);
        assert_eq!(config.segment_window_ms, 3_000);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = BridgeConfig::from_toml_str("segment_poll_ms = 500\n").unwrap();
        assert_eq!(config.segment_poll_ms, 500);
        // Unspecified keys keep their defaults
        assert_eq!(config.segment_window_ms, 3_000);
    }

    #[test]
    fn test_from_toml_str_malformed() {
        let result = BridgeConfig::from_toml_str("segment_poll_ms = \"fast\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_window_must_exceed_poll() {
        let config = BridgeConfig::from_toml_str(
            "segment_poll_ms = 2000\nsegment_window_ms = 2000\n",
        )
        .unwrap();
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = BridgeConfig::from_toml_str("progress_poll_ms = 0\n").unwrap();
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "progress_poll_ms = 250").unwrap();

        let config = BridgeConfig::from_file(file.path().to_path_buf()).unwrap();
        assert_eq!(config.progress_poll_ms, 250);
        assert_eq!(
            config.progress_poll_interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_from_file_missing() {
        let result = BridgeConfig::from_file(PathBuf::from("/nonexistent/vpb.toml"));
        assert!(result.is_err());
    }
}
