//! Error types for the AI subsystem.

use thiserror::Error;
use uuid::Uuid;
use viarte_core::ViarteError;

/// Errors that can occur in AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// The content classifier could not tag a clip.
    #[error("Classification failed for clip {clip_id}: {reason}")]
    Classification { clip_id: Uuid, reason: String },

    /// A suggestion task panicked or was cancelled.
    #[error("Suggestion task failed: {0}")]
    TaskFailed(String),

    /// Progress feed transport error.
    #[error("Feed error: {0}")]
    Feed(String),

    #[error(transparent)]
    Core(#[from] ViarteError),
}

/// Result type alias for AI operations.
pub type AiResult<T> = std::result::Result<T, AiError>;
