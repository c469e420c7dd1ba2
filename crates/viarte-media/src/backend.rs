//! Codec backend abstraction: capability queries and session factories.

use viarte_core::{Result, VideoFrame};

use crate::chunk::EncodedChunk;
use crate::config::{DecoderConfig, EncoderConfig};

/// Codec strings probed for export support.
pub const CANDIDATE_CODECS: [&str; 6] = [
    "vp8",
    "vp09.00.10.08",
    "avc1.42001E", // H.264 Baseline
    "avc1.4D401E", // H.264 Main
    "avc1.64001E", // H.264 High
    "av01.0.05M.08",
];

/// Answer to a capability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Support {
    pub supported: bool,
    /// Why the configuration was rejected
    pub reason: Option<String>,
}

impl Support {
    pub fn yes() -> Self {
        Self {
            supported: true,
            reason: None,
        }
    }

    pub fn no(reason: impl Into<String>) -> Self {
        Self {
            supported: false,
            reason: Some(reason.into()),
        }
    }
}

/// A configured encoder instance. Runs on a session thread.
pub trait VideoEncoderImpl: Send {
    /// Compress one frame. The output order follows submission order.
    fn encode(&mut self, frame: &VideoFrame, key_frame: bool) -> Result<Vec<EncodedChunk>>;

    /// Emit anything still buffered.
    fn flush(&mut self) -> Result<Vec<EncodedChunk>>;

    /// Configuration a decoder needs to read this encoder's output.
    fn decoder_config(&self) -> DecoderConfig;
}

/// A configured decoder instance. Runs on a session thread.
pub trait VideoDecoderImpl: Send {
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Vec<VideoFrame>>;

    fn flush(&mut self) -> Result<Vec<VideoFrame>>;
}

/// Source of codec sessions.
pub trait CodecBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Codecs specific to this backend, probed alongside [`CANDIDATE_CODECS`].
    fn native_codecs(&self) -> &[&'static str] {
        &[]
    }

    fn encoder_support(&self, config: &EncoderConfig) -> Support;

    fn decoder_support(&self, config: &DecoderConfig) -> Support;

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoderImpl>>;

    fn create_decoder(&self, config: &DecoderConfig) -> Result<Box<dyn VideoDecoderImpl>>;
}

/// Codecs the backend can encode at 1920x1080, 5 Mbps, 30 fps.
///
/// Checks [`CANDIDATE_CODECS`] plus the backend's native codecs.
pub fn probe_codecs(backend: &dyn CodecBackend) -> Vec<String> {
    CANDIDATE_CODECS
        .iter()
        .chain(backend.native_codecs())
        .filter(|codec| {
            let config = EncoderConfig::new(**codec, 1920, 1080);
            backend.encoder_support(&config).supported
        })
        .map(|codec| codec.to_string())
        .collect()
}
