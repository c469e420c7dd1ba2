//! Viarte Core - Foundation types for the editing studio
//!
//! This crate provides the fundamental types used throughout Viarte:
//! - Error type shared by every crate
//! - Studio configuration (TOML)
//! - Frame buffers and timestamped video frames
//! - Frame rate and microsecond timestamp math

pub mod config;
pub mod error;
pub mod frame;
pub mod time;

pub use config::{
    AdvisorConfig, EditorConfig, ExportConfig, FeedConfig, HardwareAcceleration, StudioConfig,
};
pub use error::{Result, ViarteError};
pub use frame::{FrameBuffer, FramePlane, PixelFormat, VideoFrame};
pub use time::{FrameRate, MICROS_PER_SECOND};
