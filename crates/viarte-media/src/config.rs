//! Encoder/decoder session configuration and key frame policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use viarte_core::{ExportConfig, FrameRate, HardwareAcceleration, PixelFormat};

/// Requested encoder session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderConfig {
    /// Codec string, e.g. `rle1` or `avc1.42001E`
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Target bitrate in bits per second
    pub bitrate: u64,
    pub framerate: FrameRate,
    #[serde(default)]
    pub hardware_acceleration: HardwareAcceleration,
}

impl EncoderConfig {
    pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            codec: codec.into(),
            width,
            height,
            bitrate: 5_000_000,
            framerate: FrameRate::FPS_30,
            hardware_acceleration: HardwareAcceleration::PreferHardware,
        }
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_framerate(mut self, framerate: FrameRate) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_hardware_acceleration(mut self, preference: HardwareAcceleration) -> Self {
        self.hardware_acceleration = preference;
        self
    }
}

impl From<&ExportConfig> for EncoderConfig {
    fn from(export: &ExportConfig) -> Self {
        Self {
            codec: export.codec.clone(),
            width: export.width,
            height: export.height,
            bitrate: export.bitrate,
            framerate: export.framerate,
            hardware_acceleration: export.hardware_acceleration,
        }
    }
}

impl fmt::Display for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} @ {} bps, {} fps, {:?}",
            self.codec, self.width, self.height, self.bitrate, self.framerate, self.hardware_acceleration
        )
    }
}

/// Requested decoder session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoderConfig {
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coded_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coded_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PixelFormat>,
}

impl DecoderConfig {
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            coded_width: None,
            coded_height: None,
            format: None,
        }
    }
}

/// Key frame interval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GopPolicy {
    /// Frames between key frames. 0 means only the first frame is a key frame.
    pub interval: u32,
}

impl GopPolicy {
    pub const fn new(interval: u32) -> Self {
        Self { interval }
    }

    /// Whether the frame at `index` must be a key frame.
    pub fn is_key_frame(&self, index: u64) -> bool {
        if self.interval == 0 {
            return index == 0;
        }
        index % self.interval as u64 == 0
    }
}

impl Default for GopPolicy {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gop_keys() {
        let gop = GopPolicy::default();
        let keys: Vec<u64> = (0..100).filter(|i| gop.is_key_frame(*i)).collect();
        assert_eq!(keys, [0, 30, 60, 90]);
    }

    #[test]
    fn test_zero_interval_only_first() {
        let gop = GopPolicy::new(0);
        assert!(gop.is_key_frame(0));
        assert!(!gop.is_key_frame(30));
    }

    #[test]
    fn test_from_export_config() {
        let export = ExportConfig::default();
        let config = EncoderConfig::from(&export);
        assert_eq!(config.codec, "rle1");
        assert_eq!((config.width, config.height), (1280, 720));
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let config = EncoderConfig::new("rle1", 64, 32)
            .with_hardware_acceleration(HardwareAcceleration::PreferSoftware);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["hardwareAcceleration"], "prefer-software");
        assert_eq!(json["framerate"], 30);
    }
}
