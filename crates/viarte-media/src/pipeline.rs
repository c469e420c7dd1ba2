//! Frame codec pipeline.
//!
//! Wraps one encoder session and one decoder session. Each open session
//! runs its codec on a dedicated thread fed by a FIFO job channel, so
//! `encode_frame` / `decode_chunk` return as soon as the work is queued.
//! Output is delivered through the callbacks given at initialization,
//! which run on the session thread. Callbacks must not call back into the
//! pipeline.
//!
//! Session states:
//!
//! ```text
//! Unconfigured → Configuring → Ready ⇄ Encoding/Decoding
//!                              Ready → Flushing → Ready
//!                              any   → Closed (destroy or codec error)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use viarte_core::{Result, VideoFrame, ViarteError};

use crate::backend::{CodecBackend, VideoDecoderImpl, VideoEncoderImpl};
use crate::chunk::{ChunkMetadata, EncodedChunk};
use crate::config::{DecoderConfig, EncoderConfig};
use crate::software::SoftwareBackend;

/// Lifecycle of a codec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unconfigured,
    Configuring,
    Ready,
    Encoding,
    Decoding,
    Flushing,
    Closed,
}

type Ack = Sender<Result<()>>;

enum EncodeJob {
    Frame { frame: VideoFrame, key_frame: bool },
    Flush(Ack),
}

enum DecodeJob {
    Chunk(EncodedChunk),
    Flush(Ack),
}

impl EncodeJob {
    fn into_ack(self) -> Option<Ack> {
        match self {
            Self::Flush(ack) => Some(ack),
            Self::Frame { .. } => None,
        }
    }
}

impl DecodeJob {
    fn into_ack(self) -> Option<Ack> {
        match self {
            Self::Flush(ack) => Some(ack),
            Self::Chunk(_) => None,
        }
    }
}

/// A running session thread.
struct Session<J> {
    jobs: Sender<J>,
    handle: JoinHandle<()>,
}

impl<J> Session<J> {
    fn spawn(name: &str, body: impl FnOnce(Receiver<J>) + Send + 'static) -> Result<Self>
    where
        J: Send + 'static,
    {
        let (jobs, rx) = unbounded();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(rx))
            .map_err(|e| ViarteError::Internal(format!("Failed to spawn {} thread: {}", name, e)))?;
        Ok(Self { jobs, handle })
    }

    /// Close the job channel and wait for the thread to exit.
    fn close(self) {
        drop(self.jobs);
        if self.handle.join().is_err() {
            warn!("Codec session thread panicked");
        }
    }
}

/// Encoder and decoder sessions over a [`CodecBackend`].
///
/// Encoded chunks are retained until [`clear_chunks`](Self::clear_chunks),
/// [`take_chunks`](Self::take_chunks) or [`destroy`](Self::destroy).
pub struct FramePipeline {
    backend: Arc<dyn CodecBackend>,
    encoder: Option<Session<EncodeJob>>,
    decoder: Option<Session<DecodeJob>>,
    encoder_state: Arc<Mutex<SessionState>>,
    decoder_state: Arc<Mutex<SessionState>>,
    chunks: Arc<Mutex<Vec<EncodedChunk>>>,
}

impl FramePipeline {
    pub fn new(backend: Arc<dyn CodecBackend>) -> Self {
        Self {
            backend,
            encoder: None,
            decoder: None,
            encoder_state: Arc::new(Mutex::new(SessionState::Unconfigured)),
            decoder_state: Arc::new(Mutex::new(SessionState::Unconfigured)),
            chunks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pipeline over the built-in software backend.
    pub fn software() -> Self {
        Self::new(Arc::new(SoftwareBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn CodecBackend> {
        &self.backend
    }

    pub fn encoder_state(&self) -> SessionState {
        *self.encoder_state.lock()
    }

    pub fn decoder_state(&self) -> SessionState {
        *self.decoder_state.lock()
    }

    // ── Encoder ─────────────────────────────────────────────────

    /// Open the encoder session.
    ///
    /// The configuration is checked against the backend first; an
    /// unsupported configuration fails here with
    /// [`ViarteError::UnsupportedConfig`] and leaves the session unconfigured.
    /// Runtime failures are reported through `on_error` and close the session.
    pub fn initialize_encoder<C, E>(&mut self, config: &EncoderConfig, on_chunk: C, on_error: E) -> Result<()>
    where
        C: FnMut(&EncodedChunk, Option<&ChunkMetadata>) + Send + 'static,
        E: FnMut(ViarteError) + Send + 'static,
    {
        if self.encoder.is_some() {
            return Err(ViarteError::InvalidState("Encoder already initialized".into()));
        }
        *self.encoder_state.lock() = SessionState::Configuring;

        let opened = self.open_encoder(config, on_chunk, on_error);
        match opened {
            Ok(session) => {
                self.encoder = Some(session);
                *self.encoder_state.lock() = SessionState::Ready;
                info!(
                    backend = self.backend.name(),
                    codec = %config.codec,
                    width = config.width,
                    height = config.height,
                    "Video encoder initialized"
                );
                Ok(())
            }
            Err(e) => {
                *self.encoder_state.lock() = SessionState::Unconfigured;
                error!(codec = %config.codec, error = %e, "Encoder initialization failed");
                Err(e)
            }
        }
    }

    fn open_encoder<C, E>(&self, config: &EncoderConfig, on_chunk: C, on_error: E) -> Result<Session<EncodeJob>>
    where
        C: FnMut(&EncodedChunk, Option<&ChunkMetadata>) + Send + 'static,
        E: FnMut(ViarteError) + Send + 'static,
    {
        let support = self.backend.encoder_support(config);
        if !support.supported {
            return Err(ViarteError::UnsupportedConfig(format!(
                "Encoder config not supported: {} ({})",
                config,
                support.reason.unwrap_or_else(|| "no reason given".into())
            )));
        }

        let encoder = self.backend.create_encoder(config)?;
        let state = Arc::clone(&self.encoder_state);
        let chunks = Arc::clone(&self.chunks);
        Session::spawn("viarte-encoder", move |jobs| {
            run_encoder(encoder, jobs, state, chunks, on_chunk, on_error)
        })
    }

    /// Queue a frame for compression. The frame is dropped on the session
    /// thread right after it has been encoded.
    pub fn encode_frame(&mut self, frame: VideoFrame, key_frame: bool) -> Result<()> {
        let session = self
            .encoder
            .as_ref()
            .ok_or_else(|| ViarteError::InvalidState("Encoder not initialized".into()))?;
        submit(
            session,
            &self.encoder_state,
            SessionState::Encoding,
            EncodeJob::Frame { frame, key_frame },
        )
    }

    /// Block until every queued frame has produced its chunk (or an error).
    ///
    /// Returns immediately when no encoder is open.
    pub fn flush_encoder(&mut self) -> Result<()> {
        let Some(session) = self.encoder.as_ref() else {
            return Ok(());
        };
        flush(session, &self.encoder_state, EncodeJob::Flush)?;
        debug!(chunks = self.chunk_count(), "Encoder flushed");
        Ok(())
    }

    // ── Decoder ─────────────────────────────────────────────────

    /// Open the decoder session. Same failure rules as the encoder.
    pub fn initialize_decoder<F, E>(&mut self, config: &DecoderConfig, on_frame: F, on_error: E) -> Result<()>
    where
        F: FnMut(VideoFrame) + Send + 'static,
        E: FnMut(ViarteError) + Send + 'static,
    {
        if self.decoder.is_some() {
            return Err(ViarteError::InvalidState("Decoder already initialized".into()));
        }
        *self.decoder_state.lock() = SessionState::Configuring;

        let opened = self.open_decoder(config, on_frame, on_error);
        match opened {
            Ok(session) => {
                self.decoder = Some(session);
                *self.decoder_state.lock() = SessionState::Ready;
                info!(backend = self.backend.name(), codec = %config.codec, "Video decoder initialized");
                Ok(())
            }
            Err(e) => {
                *self.decoder_state.lock() = SessionState::Unconfigured;
                error!(codec = %config.codec, error = %e, "Decoder initialization failed");
                Err(e)
            }
        }
    }

    fn open_decoder<F, E>(&self, config: &DecoderConfig, on_frame: F, on_error: E) -> Result<Session<DecodeJob>>
    where
        F: FnMut(VideoFrame) + Send + 'static,
        E: FnMut(ViarteError) + Send + 'static,
    {
        let support = self.backend.decoder_support(config);
        if !support.supported {
            return Err(ViarteError::UnsupportedConfig(format!(
                "Decoder config not supported: {} ({})",
                config.codec,
                support.reason.unwrap_or_else(|| "no reason given".into())
            )));
        }

        let decoder = self.backend.create_decoder(config)?;
        let state = Arc::clone(&self.decoder_state);
        Session::spawn("viarte-decoder", move |jobs| {
            run_decoder(decoder, jobs, state, on_frame, on_error)
        })
    }

    /// Queue a chunk for decoding.
    pub fn decode_chunk(&mut self, chunk: EncodedChunk) -> Result<()> {
        let session = self
            .decoder
            .as_ref()
            .ok_or_else(|| ViarteError::InvalidState("Decoder not initialized".into()))?;
        submit(session, &self.decoder_state, SessionState::Decoding, DecodeJob::Chunk(chunk))
    }

    /// Block until every queued chunk has produced its frames (or an error).
    pub fn flush_decoder(&mut self) -> Result<()> {
        let Some(session) = self.decoder.as_ref() else {
            return Ok(());
        };
        flush(session, &self.decoder_state, DecodeJob::Flush)?;
        debug!("Decoder flushed");
        Ok(())
    }

    // ── Chunk buffer ────────────────────────────────────────────

    /// Copy of every chunk produced so far, in output order.
    pub fn encoded_chunks(&self) -> Vec<EncodedChunk> {
        self.chunks.lock().clone()
    }

    /// Move the retained chunks out, leaving the buffer empty.
    pub fn take_chunks(&self) -> Vec<EncodedChunk> {
        std::mem::take(&mut *self.chunks.lock())
    }

    pub fn clear_chunks(&self) {
        self.chunks.lock().clear();
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Close both sessions and drop buffered chunks. Queued work is
    /// abandoned. Calling it again is a no-op.
    pub fn destroy(&mut self) {
        let had_sessions = self.encoder.is_some() || self.decoder.is_some();

        if let Some(session) = self.encoder.take() {
            *self.encoder_state.lock() = SessionState::Closed;
            session.close();
        }
        if let Some(session) = self.decoder.take() {
            *self.decoder_state.lock() = SessionState::Closed;
            session.close();
        }
        self.chunks.lock().clear();

        if had_sessions {
            info!("Frame pipeline destroyed");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Queue a job, moving the session into `busy`.
fn submit<J>(session: &Session<J>, state: &Mutex<SessionState>, busy: SessionState, job: J) -> Result<()> {
    let mut current = state.lock();
    match *current {
        SessionState::Ready => *current = busy,
        s if s == busy => {}
        other => {
            return Err(ViarteError::InvalidState(format!(
                "Cannot submit work while session is {:?}",
                other
            )))
        }
    }
    if session.jobs.send(job).is_err() {
        *current = SessionState::Closed;
        return Err(ViarteError::InvalidState("Codec session has stopped".into()));
    }
    Ok(())
}

/// Queue a flush marker and wait for the session thread to reach it.
fn flush<J>(session: &Session<J>, state: &Mutex<SessionState>, marker: impl FnOnce(Ack) -> J) -> Result<()> {
    let (ack_tx, ack_rx) = bounded(1);
    {
        let mut current = state.lock();
        if *current == SessionState::Closed {
            return Err(ViarteError::InvalidState("Cannot flush a closed session".into()));
        }
        *current = SessionState::Flushing;
        if session.jobs.send(marker(ack_tx)).is_err() {
            *current = SessionState::Closed;
            return Err(ViarteError::InvalidState("Codec session has stopped".into()));
        }
    }

    let result = ack_rx
        .recv()
        .map_err(|_| ViarteError::InvalidState("Codec session stopped during flush".into()))?;

    let mut current = state.lock();
    if *current == SessionState::Flushing {
        *current = SessionState::Ready;
    }
    result
}

/// Return the session to Ready once its queue is empty.
fn settle<J>(state: &Mutex<SessionState>, busy: SessionState, jobs: &Receiver<J>) {
    let mut current = state.lock();
    if *current == busy && jobs.is_empty() {
        *current = SessionState::Ready;
    }
}

/// Error reported to flushes queued behind a closed session.
fn closed_error(failure: &Option<String>, make: fn(String) -> ViarteError) -> ViarteError {
    match failure {
        Some(reason) => make(format!("session closed after error: {}", reason)),
        None => ViarteError::InvalidState("session closed".into()),
    }
}

fn run_encoder<C, E>(
    mut encoder: Box<dyn VideoEncoderImpl>,
    jobs: Receiver<EncodeJob>,
    state: Arc<Mutex<SessionState>>,
    chunks: Arc<Mutex<Vec<EncodedChunk>>>,
    mut on_chunk: C,
    mut on_error: E,
) where
    C: FnMut(&EncodedChunk, Option<&ChunkMetadata>),
    E: FnMut(ViarteError),
{
    let mut described = false;
    let mut failure: Option<String> = None;

    while let Ok(job) = jobs.recv() {
        if *state.lock() == SessionState::Closed {
            if let Some(ack) = job.into_ack() {
                let _ = ack.send(Err(closed_error(&failure, ViarteError::Encoder)));
            }
            continue;
        }

        let outcome = match job {
            EncodeJob::Frame { frame, key_frame } => encoder.encode(&frame, key_frame),
            EncodeJob::Flush(ack) => {
                let flushed = encoder.flush();
                let ok = flushed.as_ref().map(|_| ()).map_err(|e| ViarteError::Encoder(e.to_string()));
                if let Ok(out) = flushed {
                    deliver(out, encoder.as_ref(), &mut described, &chunks, &mut on_chunk);
                }
                let _ = ack.send(ok);
                Ok(Vec::new())
            }
        };

        match outcome {
            Ok(out) => deliver(out, encoder.as_ref(), &mut described, &chunks, &mut on_chunk),
            Err(e) => {
                error!(error = %e, "Encoder error");
                failure = Some(e.to_string());
                on_error(e);
                *state.lock() = SessionState::Closed;
            }
        }
        settle(&state, SessionState::Encoding, &jobs);
    }
}

fn deliver<C>(
    out: Vec<EncodedChunk>,
    encoder: &dyn VideoEncoderImpl,
    described: &mut bool,
    chunks: &Mutex<Vec<EncodedChunk>>,
    on_chunk: &mut C,
) where
    C: FnMut(&EncodedChunk, Option<&ChunkMetadata>),
{
    for chunk in out {
        let metadata = (chunk.is_key() && !*described).then(|| {
            *described = true;
            ChunkMetadata {
                decoder_config: Some(encoder.decoder_config()),
            }
        });
        on_chunk(&chunk, metadata.as_ref());
        chunks.lock().push(chunk);
    }
}

fn run_decoder<F, E>(
    mut decoder: Box<dyn VideoDecoderImpl>,
    jobs: Receiver<DecodeJob>,
    state: Arc<Mutex<SessionState>>,
    mut on_frame: F,
    mut on_error: E,
) where
    F: FnMut(VideoFrame),
    E: FnMut(ViarteError),
{
    let mut failure: Option<String> = None;

    while let Ok(job) = jobs.recv() {
        if *state.lock() == SessionState::Closed {
            if let Some(ack) = job.into_ack() {
                let _ = ack.send(Err(closed_error(&failure, ViarteError::Decoder)));
            }
            continue;
        }

        let outcome = match job {
            DecodeJob::Chunk(chunk) => decoder.decode(&chunk),
            DecodeJob::Flush(ack) => {
                let flushed = decoder.flush();
                let ok = flushed.as_ref().map(|_| ()).map_err(|e| ViarteError::Decoder(e.to_string()));
                if let Ok(frames) = flushed {
                    frames.into_iter().for_each(&mut on_frame);
                }
                let _ = ack.send(ok);
                Ok(Vec::new())
            }
        };

        match outcome {
            Ok(frames) => frames.into_iter().for_each(&mut on_frame),
            Err(e) => {
                error!(error = %e, "Decoder error");
                failure = Some(e.to_string());
                on_error(e);
                *state.lock() = SessionState::Closed;
            }
        }
        settle(&state, SessionState::Decoding, &jobs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;
    use crate::config::GopPolicy;
    use viarte_core::{FrameBuffer, FrameRate};

    fn frame(index: u64) -> VideoFrame {
        VideoFrame::from_image(
            FrameBuffer::test_pattern(16, 8, (index / 10) as u32),
            index,
            FrameRate::FPS_30,
        )
    }

    fn encoder_config() -> EncoderConfig {
        EncoderConfig::new("rle1", 16, 8)
    }

    #[test]
    fn test_key_frames_and_order() {
        let mut pipeline = FramePipeline::software();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline
            .initialize_encoder(
                &encoder_config(),
                move |chunk, _| sink.lock().push((chunk.timestamp_us, chunk.is_key())),
                |e| panic!("unexpected encoder error: {e}"),
            )
            .unwrap();

        let gop = GopPolicy::default();
        for i in 0..100 {
            pipeline.encode_frame(frame(i), gop.is_key_frame(i)).unwrap();
        }
        pipeline.flush_encoder().unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 100);
        let timestamps: Vec<i64> = seen.iter().map(|(ts, _)| *ts).collect();
        let expected: Vec<i64> = (0..100).map(|i| FrameRate::FPS_30.timestamp_us(i)).collect();
        assert_eq!(timestamps, expected);

        let keys: Vec<usize> = seen
            .iter()
            .enumerate()
            .filter(|(_, (_, key))| *key)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(keys, [0, 30, 60, 90]);
        assert_eq!(pipeline.chunk_count(), 100);
        assert_eq!(pipeline.encoder_state(), SessionState::Ready);
    }

    #[test]
    fn test_metadata_only_on_first_key() {
        let mut pipeline = FramePipeline::software();
        let described = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&described);
        pipeline
            .initialize_encoder(
                &encoder_config(),
                move |_, metadata| sink.lock().push(metadata.cloned()),
                |_| {},
            )
            .unwrap();
        for i in 0..40 {
            pipeline.encode_frame(frame(i), i % 30 == 0).unwrap();
        }
        pipeline.flush_encoder().unwrap();

        let described = described.lock();
        assert!(described[0].is_some());
        assert_eq!(described.iter().filter(|m| m.is_some()).count(), 1);
        let config = described[0].as_ref().unwrap().decoder_config.as_ref().unwrap();
        assert_eq!(config.coded_width, Some(16));
    }

    #[test]
    fn test_unsupported_config_fails_fast() {
        let mut pipeline = FramePipeline::software();
        let err = pipeline
            .initialize_encoder(&EncoderConfig::new("avc1.42001E", 1920, 1080), |_, _| {}, |_| {})
            .unwrap_err();
        assert!(matches!(err, ViarteError::UnsupportedConfig(_)));
        assert_eq!(pipeline.encoder_state(), SessionState::Unconfigured);
        assert!(matches!(
            pipeline.encode_frame(frame(0), true),
            Err(ViarteError::InvalidState(_))
        ));
    }

    #[test]
    fn test_flush_without_encoder_is_noop() {
        let mut pipeline = FramePipeline::software();
        pipeline.flush_encoder().unwrap();
        pipeline.flush_decoder().unwrap();
    }

    #[test]
    fn test_runtime_error_keeps_produced_chunks() {
        let mut pipeline = FramePipeline::software();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        pipeline
            .initialize_encoder(&encoder_config(), |_, _| {}, move |e| sink.lock().push(e.to_string()))
            .unwrap();

        for i in 0..5 {
            pipeline.encode_frame(frame(i), i == 0).unwrap();
        }
        let wrong_size = VideoFrame::new(FrameBuffer::solid(4, 4, [0, 0, 0, 255]), 0, 1);
        pipeline.encode_frame(wrong_size, false).unwrap();

        assert!(pipeline.flush_encoder().is_err());
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(pipeline.encoder_state(), SessionState::Closed);
        assert_eq!(pipeline.encoded_chunks().len(), 5);
        assert!(pipeline.encode_frame(frame(6), false).is_err());
    }

    #[test]
    fn test_decode_through_sessions() {
        let mut pipeline = FramePipeline::software();
        pipeline.initialize_encoder(&encoder_config(), |_, _| {}, |_| {}).unwrap();
        for i in 0..12 {
            pipeline.encode_frame(frame(i), i == 0).unwrap();
        }
        pipeline.flush_encoder().unwrap();
        let chunks = pipeline.take_chunks();
        assert_eq!(pipeline.chunk_count(), 0);

        let decoded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&decoded);
        pipeline
            .initialize_decoder(&DecoderConfig::new("rle1"), move |f| sink.lock().push(f), |_| {})
            .unwrap();
        for chunk in chunks {
            pipeline.decode_chunk(chunk).unwrap();
        }
        pipeline.flush_decoder().unwrap();

        let decoded = decoded.lock();
        assert_eq!(decoded.len(), 12);
        assert_eq!(decoded[11].buffer.to_packed(), frame(11).buffer.to_packed());
        assert_eq!(pipeline.decoder_state(), SessionState::Ready);
    }

    #[test]
    fn test_corrupt_chunk_dimensions_reach_on_error() {
        let mut data = b"RLE1".to_vec();
        data.extend_from_slice(&[0, 1]);
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        let chunk = EncodedChunk {
            chunk_type: ChunkType::Key,
            timestamp_us: 0,
            duration_us: 33_333,
            data,
        };

        let mut pipeline = FramePipeline::software();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        pipeline
            .initialize_decoder(&DecoderConfig::new("rle1"), |_| {}, move |e| sink.lock().push(e))
            .unwrap();
        pipeline.decode_chunk(chunk).unwrap();

        assert!(pipeline.flush_decoder().is_err());
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ViarteError::Decoder(_)));
        assert_eq!(pipeline.decoder_state(), SessionState::Closed);
    }

    #[test]
    fn test_destroy_twice() {
        let mut pipeline = FramePipeline::software();
        pipeline.initialize_encoder(&encoder_config(), |_, _| {}, |_| {}).unwrap();
        pipeline.encode_frame(frame(0), true).unwrap();
        pipeline.flush_encoder().unwrap();

        pipeline.destroy();
        pipeline.destroy();
        assert_eq!(pipeline.encoder_state(), SessionState::Closed);
        assert_eq!(pipeline.chunk_count(), 0);
        assert!(pipeline.encode_frame(frame(1), false).is_err());
    }

    #[test]
    fn test_reinitialize_after_destroy() {
        let mut pipeline = FramePipeline::software();
        pipeline.initialize_encoder(&encoder_config(), |_, _| {}, |_| {}).unwrap();
        assert!(pipeline
            .initialize_encoder(&encoder_config(), |_, _| {}, |_| {})
            .is_err());
        pipeline.destroy();
        pipeline.initialize_encoder(&encoder_config(), |_, _| {}, |_| {}).unwrap();
        assert_eq!(pipeline.encoder_state(), SessionState::Ready);
    }
}
