//! Generation progress feed.
//!
//! A long-lived connection to the generation service that pushes job
//! updates. The connection is an explicit state machine with a cancellable
//! reconnect timer:
//!
//! ```text
//! Disconnected → Connecting → Connected
//!                    ↑            │ closed / error
//!                    └── Reconnecting { attempt, delay }
//! ```
//!
//! Shutdown from any state goes straight to `Disconnected`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use viarte_core::FeedConfig;

use crate::error::AiResult;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            attempt: 0,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_initial_ms),
            Duration::from_millis(config.reconnect_max_ms),
            config.reconnect_multiplier,
        )
    }

    /// Delay before the next attempt, then count the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.multiplier.max(1.0).powi(self.attempt.min(64) as i32);
        let delay = self.initial.as_secs_f64() * factor;
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs_f64(delay.min(self.max.as_secs_f64()))
    }

    /// Attempts since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// A generation job as pushed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Messages the feed understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedMessage {
    GenerationUpdate(GenerationJob),
}

/// Jobs known to the client, most recently discovered first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobBoard {
    jobs: Vec<GenerationJob>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the job with the same id, or prepend an unknown one.
    pub fn upsert(&mut self, job: GenerationJob) {
        match self.jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.insert(0, job),
        }
    }

    pub fn jobs(&self) -> &[GenerationJob] {
        &self.jobs
    }

    pub fn get(&self, id: &str) -> Option<&GenerationJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Any job still pending or processing.
    pub fn is_generating(&self) -> bool {
        self.jobs.iter().any(|job| job.status.is_active())
    }
}

/// The socket under the feed.
pub trait FeedTransport: Send {
    /// Open a connection.
    fn connect(&mut self, url: &str) -> impl Future<Output = AiResult<()>> + Send;

    /// Next text message. `None` once the connection has closed.
    fn next_message(&mut self) -> impl Future<Output = Option<AiResult<String>>> + Send;
}

/// Why [`FeedConnection::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExit {
    Shutdown,
}

/// Reconnecting client that keeps a [`JobBoard`] current.
pub struct FeedConnection<T> {
    transport: T,
    url: String,
    backoff: Backoff,
    board: JobBoard,
    state: watch::Sender<FeedState>,
}

impl<T: FeedTransport> FeedConnection<T> {
    pub fn new(transport: T, config: &FeedConfig) -> Self {
        let (state, _) = watch::channel(FeedState::Disconnected);
        Self {
            transport,
            url: config.url.clone(),
            backoff: Backoff::from_config(config),
            board: JobBoard::new(),
            state,
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn set_state(&self, state: FeedState) {
        self.state.send_replace(state);
    }

    /// Apply one raw message. Returns whether the board changed.
    pub fn handle_message(&mut self, text: &str) -> bool {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed feed message");
                return false;
            }
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("generation_update") {
            debug!("Ignoring feed message of unknown type");
            return false;
        }

        match serde_json::from_value::<FeedMessage>(value) {
            Ok(FeedMessage::GenerationUpdate(job)) => {
                debug!(job = %job.id, status = ?job.status, "Generation update");
                self.board.upsert(job);
                true
            }
            Err(e) => {
                warn!(error = %e, "Ignoring invalid generation update");
                false
            }
        }
    }

    /// Keep the feed connected until `shutdown` fires (or its sender is
    /// dropped). Pending reconnect timers are cancelled on shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> FeedExit {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(FeedState::Connecting);
            let connected = tokio::select! {
                result = self.transport.connect(&self.url) => result,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match connected {
                Ok(()) => {
                    self.set_state(FeedState::Connected);
                    self.backoff.reset();
                    info!(url = %self.url, "Progress feed connected");

                    loop {
                        let message = tokio::select! {
                            message = self.transport.next_message() => message,
                            _ = shutdown_requested(&mut shutdown) => None,
                        };
                        match message {
                            Some(Ok(text)) => {
                                self.handle_message(&text);
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Progress feed read failed");
                                break;
                            }
                            None => break,
                        }
                    }
                    if *shutdown.borrow() || shutdown.has_changed().is_err() {
                        break;
                    }
                    info!("Progress feed closed");
                }
                Err(e) => warn!(url = %self.url, error = %e, "Progress feed connect failed"),
            }

            let delay = self.backoff.next_delay();
            let attempt = self.backoff.attempt();
            self.set_state(FeedState::Reconnecting { attempt, delay });
            debug!(attempt, ?delay, "Progress feed reconnect scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.set_state(FeedState::Disconnected);
        info!("Progress feed stopped");
        FeedExit::Shutdown
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
}
