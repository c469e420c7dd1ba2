//! Viarte AI - Content-aware editing assistance
//!
//! Provides:
//! - Content classification of clips
//! - Smart transition suggestions for a track
//! - The generation progress feed with automatic reconnect

pub mod advisor;
pub mod classify;
pub mod error;
pub mod feed;

pub use advisor::{
    choose_transition, ApplyReport, Suggestion, SuggestionFailure, TransitionAdvisor,
    TransitionPlan,
};
pub use classify::{ContentClassifier, ContentTag, KeywordClassifier, RandomClassifier, TagSet};
pub use error::{AiError, AiResult};
pub use feed::{
    Backoff, FeedConnection, FeedExit, FeedMessage, FeedState, FeedTransport, GenerationJob,
    JobBoard, JobStatus,
};
