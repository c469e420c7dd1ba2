//! Studio configuration.
//!
//! Loaded from a TOML file; every section and field falls back to its
//! default when omitted, so a partial file is always valid input.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, ViarteError};
use crate::time::FrameRate;

/// Top-level configuration for Viarte Studio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Timeline editing and transport settings
    pub editor: EditorConfig,
    /// Export (encoder) settings
    pub export: ExportConfig,
    /// Smart transition settings
    pub advisor: AdvisorConfig,
    /// Generation progress feed settings
    pub feed: FeedConfig,
}

impl StudioConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ViarteError::Config(msg) => {
                ViarteError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        debug!(path = %path.display(), "Loaded studio configuration");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ViarteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ViarteError::Serialization(format!("Failed to write config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let e = &self.editor;
        if !positive(e.total_duration) {
            return Err(invalid("editor.total_duration must be positive"));
        }
        if !positive(e.min_zoom) || !e.max_zoom.is_finite() || e.max_zoom < e.min_zoom {
            return Err(invalid("editor zoom range must satisfy 0 < min_zoom <= max_zoom"));
        }
        if !positive(e.default_clip_duration) {
            return Err(invalid("editor.default_clip_duration must be positive"));
        }
        if !positive(e.tick_step) {
            return Err(invalid("editor.tick_step must be positive"));
        }
        if self.export.gop_size == 0 {
            return Err(invalid("export.gop_size must be at least 1"));
        }
        if !self.export.framerate.is_valid() {
            return Err(invalid("export.framerate must be non-zero"));
        }
        if !positive(self.advisor.transition_duration) {
            return Err(invalid("advisor.transition_duration must be positive"));
        }
        if self.feed.reconnect_multiplier < 1.0 {
            return Err(invalid("feed.reconnect_multiplier must be >= 1"));
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(msg: &str) -> ViarteError {
    ViarteError::Config(msg.to_string())
}

/// Timeline editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Timeline length in seconds (a ceiling, not derived from clips)
    pub total_duration: f64,
    /// Initial zoom in pixels per second
    pub initial_zoom: f64,
    /// Smallest zoom the UI allows
    pub min_zoom: f64,
    /// Largest zoom the UI allows
    pub max_zoom: f64,
    /// Duration given to clips added without one
    pub default_clip_duration: f64,
    /// Playhead advance per transport tick, in seconds
    pub tick_step: f64,
    /// Start with one video and one audio track
    pub default_tracks: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            total_duration: 30.0,
            initial_zoom: 50.0,
            min_zoom: 1.0,
            max_zoom: 100.0,
            default_clip_duration: 5.0,
            tick_step: 1.0 / 60.0,
            default_tracks: true,
        }
    }
}

/// Codec hardware preference, mirroring what runtime codec APIs accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareAcceleration {
    #[default]
    PreferHardware,
    PreferSoftware,
    NoPreference,
}

/// Export encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Codec string understood by the codec backend
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Target bitrate in bits per second
    pub bitrate: u64,
    pub framerate: FrameRate,
    pub hardware_acceleration: HardwareAcceleration,
    /// Key frame interval in frames
    pub gop_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            codec: "rle1".to_string(),
            width: 1280,
            height: 720,
            bitrate: 5_000_000,
            framerate: FrameRate::FPS_30,
            hardware_acceleration: HardwareAcceleration::PreferHardware,
            gop_size: 30,
        }
    }
}

/// Smart transition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Simulated classification latency in milliseconds
    pub latency_ms: u64,
    /// Duration of every suggested transition, in seconds
    pub transition_duration: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            latency_ms: 600,
            transition_duration: 1.0,
        }
    }
}

/// Generation progress feed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_multiplier: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/ws/progress".to_string(),
            reconnect_initial_ms: 3000,
            reconnect_max_ms: 30_000,
            reconnect_multiplier: 2.0,
        }
    }
}
