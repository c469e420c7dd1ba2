//! Background export worker.
//!
//! A [`VideoWorker`] owns a [`FramePipeline`] on its own thread and talks to
//! the host only through messages: [`WorkerCommand`]s in, [`WorkerEvent`]s
//! out, each direction FIFO. [`WorkerCoordinator`] is the host-side owner
//! that replaces a terminated worker on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use viarte_core::{FrameBuffer, Result, VideoFrame, ViarteError};

use crate::backend::CodecBackend;
use crate::chunk::EncodedChunk;
use crate::config::{EncoderConfig, GopPolicy};
use crate::pipeline::FramePipeline;

// ── Protocol ────────────────────────────────────────────────────

/// Host → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerCommand {
    /// Configure the encoder session.
    Init(EncoderConfig),
    /// Encode already-timestamped frames.
    Process(ProcessRequest),
    /// Timestamp raw images at a constant framerate, then process them.
    Encode(EncodeRequest),
    /// Destroy the pipeline and end the worker.
    Terminate,
}

impl WorkerCommand {
    /// Wire tag of the command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Process(_) => "process",
            Self::Encode(_) => "encode",
            Self::Terminate => "terminate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub frames: Vec<VideoFrame>,
    /// Opaque caller settings, echoed nowhere
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub frames: Vec<FrameBuffer>,
    pub config: EncoderConfig,
}

/// Per-frame progress of a bulk encode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Percentage, `(current_frame / total_frames) * 100`
    pub progress: f64,
    /// 1-based index of the frame just submitted
    pub current_frame: usize,
    pub total_frames: usize,
}

/// Worker → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerEvent {
    /// Encoder session configured.
    Ready,
    Progress(Progress),
    /// Every frame flushed; carries the full retained chunk list.
    Complete { chunks: Vec<EncodedChunk> },
    /// Any failure. `chunks` holds what the pipeline had produced so far.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        chunks: Vec<EncodedChunk>,
    },
}

/// A failed [`WorkerCoordinator::export`], with the chunks encoded before
/// the failure.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExportError {
    pub error: ViarteError,
    pub chunks: Vec<EncodedChunk>,
}

impl From<ViarteError> for ExportError {
    fn from(error: ViarteError) -> Self {
        Self {
            error,
            chunks: Vec::new(),
        }
    }
}

const KNOWN_COMMANDS: [&str; 4] = ["init", "process", "encode", "terminate"];

enum Inbound {
    Command(WorkerCommand),
    Raw(String),
}

// ── Worker ──────────────────────────────────────────────────────

/// Handle to a worker thread running a frame pipeline.
pub struct VideoWorker {
    inbox: Option<Sender<Inbound>>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    terminated: Arc<AtomicBool>,
}

impl VideoWorker {
    /// Start a worker over `backend` with the default GOP.
    pub fn spawn(backend: Arc<dyn CodecBackend>) -> Result<Self> {
        Self::spawn_with_gop(backend, GopPolicy::default())
    }

    /// Start a worker that places key frames by `gop`.
    pub fn spawn_with_gop(backend: Arc<dyn CodecBackend>, gop: GopPolicy) -> Result<Self> {
        let (inbox, inbox_rx) = unbounded();
        let (events_tx, events) = unbounded();
        let terminated = Arc::new(AtomicBool::new(false));

        let context = WorkerContext {
            backend,
            pipeline: None,
            codec_error: Arc::new(Mutex::new(None)),
            events: events_tx,
            terminated: Arc::clone(&terminated),
            gop,
        };
        let handle = thread::Builder::new()
            .name("viarte-worker".into())
            .spawn(move || context.run(inbox_rx))
            .map_err(|e| ViarteError::Worker(format!("Failed to spawn worker: {}", e)))?;

        info!(gop = gop.interval, "Video worker started");
        Ok(Self {
            inbox: Some(inbox),
            events,
            handle: Some(handle),
            terminated,
        })
    }

    /// Send a command.
    pub fn post(&self, command: WorkerCommand) -> Result<()> {
        self.send(Inbound::Command(command))
    }

    /// Send a raw JSON message; it is decoded inside the worker.
    pub fn post_json(&self, json: impl Into<String>) -> Result<()> {
        self.send(Inbound::Raw(json.into()))
    }

    fn send(&self, message: Inbound) -> Result<()> {
        if self.is_terminated() {
            return Err(ViarteError::Worker("Worker has been terminated".into()));
        }
        self.inbox
            .as_ref()
            .ok_or_else(|| ViarteError::Worker("Worker has been terminated".into()))?
            .send(message)
            .map_err(|_| ViarteError::Worker("Worker is no longer running".into()))
    }

    /// Event stream from the worker.
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event. `None` on timeout or once
    /// the worker has exited and its events are drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Whether the worker has ended, by request or by a `terminate` command.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Stop the worker. In-flight work is abandoned between frames with no
    /// completion event. Idempotent.
    pub fn terminate(&mut self) {
        self.terminated.store(true, Ordering::Release);
        if let Some(inbox) = self.inbox.take() {
            let _ = inbox.send(Inbound::Command(WorkerCommand::Terminate));
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Video worker thread panicked");
            }
            info!("Video worker terminated");
        }
    }
}

impl Drop for VideoWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// State living on the worker thread.
struct WorkerContext {
    backend: Arc<dyn CodecBackend>,
    pipeline: Option<FramePipeline>,
    /// First runtime codec error reported by the encoder callback
    codec_error: Arc<Mutex<Option<String>>>,
    events: Sender<WorkerEvent>,
    terminated: Arc<AtomicBool>,
    gop: GopPolicy,
}

/// Whether the message loop keeps going.
enum Flow {
    Continue,
    Stop,
}

impl WorkerContext {
    fn run(mut self, inbox: Receiver<Inbound>) {
        while let Ok(message) = inbox.recv() {
            let command = match message {
                Inbound::Command(command) => Ok(command),
                Inbound::Raw(json) => decode_command(&json),
            };

            let flow = match command.and_then(|command| self.handle(command)) {
                Ok(flow) => flow,
                Err(e) => {
                    if !self.is_terminated() {
                        self.emit_error(e.to_string());
                    }
                    Flow::Continue
                }
            };

            if matches!(flow, Flow::Stop) || self.is_terminated() {
                break;
            }
        }

        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
        self.terminated.store(true, Ordering::Release);
        debug!("Video worker loop exited");
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    fn emit(&self, event: WorkerEvent) {
        // The host may already have dropped its receiver.
        let _ = self.events.send(event);
    }

    fn emit_error(&self, message: String) {
        let chunks = self
            .pipeline
            .as_ref()
            .map(FramePipeline::encoded_chunks)
            .unwrap_or_default();
        warn!(error = %message, partial_chunks = chunks.len(), "Worker error");
        self.emit(WorkerEvent::Error { message, chunks });
    }

    fn handle(&mut self, command: WorkerCommand) -> Result<Flow> {
        debug!(command = command.kind(), "Worker command");
        match command {
            WorkerCommand::Init(config) => {
                self.init(&config)?;
                Ok(Flow::Continue)
            }
            WorkerCommand::Process(request) => {
                self.process(request.frames)?;
                Ok(Flow::Continue)
            }
            WorkerCommand::Encode(request) => {
                if self.pipeline.is_none() {
                    self.init(&request.config)?;
                }
                let rate = request.config.framerate;
                let frames = request
                    .frames
                    .into_iter()
                    .enumerate()
                    .map(|(i, image)| VideoFrame::from_image(image, i as u64, rate))
                    .collect();
                self.process(frames)?;
                Ok(Flow::Continue)
            }
            WorkerCommand::Terminate => Ok(Flow::Stop),
        }
    }

    fn init(&mut self, config: &EncoderConfig) -> Result<()> {
        if let Some(mut old) = self.pipeline.take() {
            old.destroy();
        }
        *self.codec_error.lock() = None;

        let mut pipeline = FramePipeline::new(Arc::clone(&self.backend));
        let slot = Arc::clone(&self.codec_error);
        pipeline.initialize_encoder(
            config,
            |_, _| {},
            move |e| {
                slot.lock().get_or_insert_with(|| e.to_string());
            },
        )?;
        self.pipeline = Some(pipeline);
        self.emit(WorkerEvent::Ready);
        Ok(())
    }

    fn process(&mut self, frames: Vec<VideoFrame>) -> Result<()> {
        let total = frames.len();
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| ViarteError::InvalidState("Processor not initialized".into()))?;

        for (i, frame) in frames.into_iter().enumerate() {
            if self.terminated.load(Ordering::Acquire) {
                debug!(frame = i, "Processing abandoned");
                return Ok(());
            }
            if let Some(reason) = self.codec_error.lock().clone() {
                return Err(ViarteError::Encoder(reason));
            }

            if let Err(e) = pipeline.encode_frame(frame, self.gop.is_key_frame(i as u64)) {
                let reason = self.codec_error.lock().clone();
                return Err(reason.map(ViarteError::Encoder).unwrap_or(e));
            }
            let _ = self.events.send(WorkerEvent::Progress(Progress {
                progress: (i + 1) as f64 / total as f64 * 100.0,
                current_frame: i + 1,
                total_frames: total,
            }));
        }

        let flushed = pipeline.flush_encoder();
        if let Some(reason) = self.codec_error.lock().clone() {
            return Err(ViarteError::Encoder(reason));
        }
        flushed?;

        let chunks = pipeline.encoded_chunks();
        info!(frames = total, chunks = chunks.len(), "Worker batch complete");
        self.emit(WorkerEvent::Complete { chunks });
        Ok(())
    }
}

/// Decode a raw message. Unknown `type` tags are reported by name.
fn decode_command(json: &str) -> Result<WorkerCommand> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ViarteError::Worker(format!("Invalid message: {}", e)))?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !KNOWN_COMMANDS.contains(&kind.as_str()) {
        return Err(ViarteError::Worker(format!("Unknown message type: {}", kind)));
    }

    serde_json::from_value(value)
        .map_err(|e| ViarteError::Worker(format!("Malformed '{}' message: {}", kind, e)))
}

// ── Coordinator ─────────────────────────────────────────────────

/// Host-side owner of at most one live worker.
///
/// A terminated worker is never reused: the next command spawns a fresh
/// one. Dropping the coordinator terminates its worker.
pub struct WorkerCoordinator {
    backend: Arc<dyn CodecBackend>,
    gop: GopPolicy,
    worker: Option<VideoWorker>,
}

impl WorkerCoordinator {
    pub fn new(backend: Arc<dyn CodecBackend>) -> Self {
        Self {
            backend,
            gop: GopPolicy::default(),
            worker: None,
        }
    }

    /// Key-frame policy for workers spawned from now on.
    pub fn with_gop(mut self, gop: GopPolicy) -> Self {
        self.gop = gop;
        self
    }

    /// The live worker, spawning one if needed.
    pub fn worker(&mut self) -> Result<&mut VideoWorker> {
        if self.worker.as_ref().map_or(true, VideoWorker::is_terminated) {
            if let Some(mut stale) = self.worker.take() {
                stale.terminate();
            }
            self.worker = Some(VideoWorker::spawn_with_gop(Arc::clone(&self.backend), self.gop)?);
        }
        self.worker
            .as_mut()
            .ok_or_else(|| ViarteError::Worker("Worker unavailable".into()))
    }

    pub fn has_live_worker(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_terminated())
    }

    pub fn initialize(&mut self, config: EncoderConfig) -> Result<()> {
        self.worker()?.post(WorkerCommand::Init(config))
    }

    pub fn process_frames(&mut self, frames: Vec<VideoFrame>, settings: serde_json::Value) -> Result<()> {
        self.worker()?
            .post(WorkerCommand::Process(ProcessRequest { frames, settings }))
    }

    pub fn encode_frames(&mut self, frames: Vec<FrameBuffer>, config: EncoderConfig) -> Result<()> {
        self.worker()?
            .post(WorkerCommand::Encode(EncodeRequest { frames, config }))
    }

    /// Next event from the live worker, if any arrives within `timeout`.
    pub fn next_event(&self, timeout: Duration) -> Option<WorkerEvent> {
        self.worker.as_ref()?.recv_timeout(timeout)
    }

    /// Encode `frames` on the worker and wait for the result.
    ///
    /// `on_progress` sees every progress event. Events left over from
    /// earlier commands are discarded before the batch is posted. On a
    /// worker error or a timeout the worker is terminated, so nothing from
    /// the failed batch reaches a later call, and the chunks produced so far
    /// come back inside the [`ExportError`].
    pub fn export(
        &mut self,
        frames: Vec<FrameBuffer>,
        config: EncoderConfig,
        timeout: Duration,
        mut on_progress: impl FnMut(&Progress),
    ) -> std::result::Result<Vec<EncodedChunk>, ExportError> {
        let outcome = self.run_batch(frames, config, timeout, &mut on_progress);
        if outcome.is_err() {
            self.terminate();
        }
        outcome
    }

    fn run_batch(
        &mut self,
        frames: Vec<FrameBuffer>,
        config: EncoderConfig,
        timeout: Duration,
        on_progress: &mut impl FnMut(&Progress),
    ) -> std::result::Result<Vec<EncodedChunk>, ExportError> {
        let worker = self.worker()?;
        let stale = std::iter::from_fn(|| worker.try_recv()).count();
        if stale > 0 {
            debug!(events = stale, "Discarded stale worker events");
        }
        worker.post(WorkerCommand::Init(config.clone()))?;
        worker.post(WorkerCommand::Encode(EncodeRequest { frames, config }))?;

        loop {
            let event = worker
                .recv_timeout(timeout)
                .ok_or_else(|| ViarteError::Worker("Timed out waiting for the worker".into()))?;
            match event {
                WorkerEvent::Ready => {}
                WorkerEvent::Progress(progress) => on_progress(&progress),
                WorkerEvent::Complete { chunks } => return Ok(chunks),
                WorkerEvent::Error { message, chunks } => {
                    warn!(partial_chunks = chunks.len(), "Export failed");
                    return Err(ExportError {
                        error: ViarteError::Worker(message),
                        chunks,
                    });
                }
            }
        }
    }

    /// Terminate the current worker. The next command starts a new one.
    pub fn terminate(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
    }
}

impl Drop for WorkerCoordinator {
    fn drop(&mut self) {
        self.terminate();
    }
}
