//! Frame rate and timestamp math for constant-framerate streams.
//!
//! Timestamps are integer microseconds. Frame positions are computed with
//! rational arithmetic so that 29.97 fps streams do not drift.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds in one second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "FrameRateRepr", into = "FrameRateRepr")]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Whole frames per second.
    #[inline]
    pub const fn from_fps(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// A rate is usable when both terms are non-zero.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Presentation timestamp of frame `index`, in microseconds.
    ///
    /// `index * 1_000_000 / fps`, truncated to whole microseconds.
    pub fn timestamp_us(self, index: u64) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        let ts = Rational64::new(
            index as i64 * MICROS_PER_SECOND * self.denominator as i64,
            self.numerator as i64,
        );
        ts.to_integer()
    }

    /// Duration of one frame, in microseconds.
    pub fn frame_duration_us(self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        Rational64::new(
            MICROS_PER_SECOND * self.denominator as i64,
            self.numerator as i64,
        )
        .to_integer()
    }

    /// Common frame rates
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// Wire form: a bare integer (`30`) or a `{ numerator, denominator }` table.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FrameRateRepr {
    Fps(u32),
    Rational { numerator: u32, denominator: u32 },
}

impl From<FrameRateRepr> for FrameRate {
    fn from(repr: FrameRateRepr) -> Self {
        match repr {
            FrameRateRepr::Fps(fps) => Self::from_fps(fps),
            FrameRateRepr::Rational {
                numerator,
                denominator,
            } => Self::new(numerator, denominator),
        }
    }
}

impl From<FrameRate> for FrameRateRepr {
    fn from(rate: FrameRate) -> Self {
        if rate.denominator == 1 {
            FrameRateRepr::Fps(rate.numerator)
        } else {
            FrameRateRepr::Rational {
                numerator: rate.numerator,
                denominator: rate.denominator,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_at_30fps() {
        let rate = FrameRate::FPS_30;
        assert_eq!(rate.timestamp_us(0), 0);
        assert_eq!(rate.timestamp_us(1), 33_333);
        assert_eq!(rate.timestamp_us(30), 1_000_000);
        assert_eq!(rate.frame_duration_us(), 33_333);
    }

    #[test]
    fn test_ntsc_rate_does_not_drift() {
        let rate = FrameRate::FPS_29_97;
        // 30000 frames at 29.97 fps is exactly 1001 seconds
        assert_eq!(rate.timestamp_us(30_000), 1_001 * MICROS_PER_SECOND);
        assert!((rate.to_fps_f64() - 29.97).abs() < 0.001);
    }

    #[test]
    fn test_invalid_rate_yields_zero() {
        let rate = FrameRate::new(0, 1);
        assert!(!rate.is_valid());
        assert_eq!(rate.timestamp_us(10), 0);
        assert_eq!(rate.frame_duration_us(), 0);
    }

    #[test]
    fn test_serde_accepts_integer_and_table() {
        let rate: FrameRate = serde_json::from_str("25").unwrap();
        assert_eq!(rate, FrameRate::FPS_25);

        let rate: FrameRate =
            serde_json::from_str(r#"{"numerator":30000,"denominator":1001}"#).unwrap();
        assert_eq!(rate, FrameRate::FPS_29_97);

        assert_eq!(serde_json::to_string(&FrameRate::FPS_60).unwrap(), "60");
    }

    #[test]
    fn test_display() {
        assert_eq!(FrameRate::FPS_30.to_string(), "30 fps");
        assert_eq!(FrameRate::FPS_29_97.to_string(), "29.970 fps");
    }
}
