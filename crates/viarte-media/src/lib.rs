//! Viarte Media - frame codec pipeline and export worker
//!
//! This crate handles:
//! - Codec backends with capability queries (software `rle1` codec built in)
//! - Encoder/decoder sessions on dedicated threads with flush semantics
//! - A message-passing background worker for bulk exports

pub mod backend;
pub mod chunk;
pub mod config;
pub mod pipeline;
pub mod software;
pub mod worker;

pub use backend::{probe_codecs, CodecBackend, Support, VideoDecoderImpl, VideoEncoderImpl, CANDIDATE_CODECS};
pub use chunk::{ChunkMetadata, ChunkSummary, ChunkType, EncodedChunk};
pub use config::{DecoderConfig, EncoderConfig, GopPolicy};
pub use pipeline::{FramePipeline, SessionState};
pub use software::{SoftwareBackend, SoftwareDecoder, SoftwareEncoder, SOFTWARE_CODEC};
pub use worker::{
    EncodeRequest, ExportError, ProcessRequest, Progress, VideoWorker, WorkerCommand, WorkerCoordinator, WorkerEvent,
};
