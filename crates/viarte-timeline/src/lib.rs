//! Viarte Timeline - editing model and timeline engine
//!
//! - Tracks owning clips, clips owning effects and an incoming transition
//! - Editor state with transport (playhead, zoom, selection)
//! - Active-clip resolution, effect composition, time/pixel mapping
//! - Playback loop and JSON snapshot files

pub mod clip;
pub mod editor;
pub mod engine;
pub mod serialization;
pub mod track;
pub mod transport;

pub use clip::{
    Clip, ClipDraft, ClipKind, ClipPatch, Effect, EffectKind, EffectValue, Transition,
    TransitionKind,
};
pub use editor::{EditorState, TransportState};
pub use engine::{active_clip, active_clips, effective_style, ClipRect, TimelineGeometry};
pub use serialization::ProjectFile;
pub use track::{Track, TrackKind};
pub use transport::{ManualScheduler, PlaybackLoop, RunOutcome, TickId, TickOutcome, TickScheduler};
