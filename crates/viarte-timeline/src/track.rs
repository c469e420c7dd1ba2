//! Track types for the timeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::Clip;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Display label used for default track names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
        }
    }
}

/// An ordered lane of clips.
///
/// Clips are stored in insertion order; timeline order is by `start`.
/// Overlapping clips are allowed here, preventing them is a UI policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: Uuid,
    /// Track name
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Clips in insertion order
    pub clips: Vec<Clip>,
}

impl Track {
    /// Create an empty track.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            clips: Vec::new(),
        }
    }

    /// Create a new video track.
    pub fn new_video(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    /// Find a clip by UUID. Returns (index, &Clip).
    pub fn find_clip(&self, id: Uuid) -> Option<(usize, &Clip)> {
        self.clips.iter().enumerate().find(|(_, c)| c.id == id)
    }

    /// Find a clip mutably by UUID. Returns (index, &mut Clip).
    pub fn find_clip_mut(&mut self, id: Uuid) -> Option<(usize, &mut Clip)> {
        self.clips.iter_mut().enumerate().find(|(_, c)| c.id == id)
    }

    /// Remove a clip by UUID, returning it.
    pub fn remove_clip(&mut self, id: Uuid) -> Option<Clip> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    /// First clip, in stored order, covering `time`.
    ///
    /// When clips overlap the earliest-inserted one wins.
    pub fn clip_at_time(&self, time: f64) -> Option<&Clip> {
        self.clips.iter().find(|c| c.contains(time))
    }

    /// Clips sorted by timeline position (stable for equal starts).
    pub fn clips_by_start(&self) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.iter().collect();
        clips.sort_by(|a, b| a.start.total_cmp(&b.start));
        clips
    }

    /// End of the last clip, or 0 for an empty track.
    pub fn end_time(&self) -> f64 {
        self.clips.iter().map(Clip::end).fold(0.0, f64::max)
    }

    /// Number of clips in this track.
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}
