//! Read-only derivations over the editor model: active clips, effective
//! style and time/pixel mapping.

use uuid::Uuid;

use crate::clip::{Clip, EffectKind};
use crate::editor::{EditorState, TransportState};
use crate::track::{Track, TrackKind};

/// The clip under `time` on a track.
///
/// Overlapping clips resolve to the first match in stored order.
pub fn active_clip(track: &Track, time: f64) -> Option<&Clip> {
    track.clip_at_time(time)
}

/// Active clip of every track at `time`, in track order.
pub fn active_clips(editor: &EditorState, time: f64) -> Vec<(Uuid, &Clip)> {
    editor
        .tracks()
        .iter()
        .filter_map(|track| active_clip(track, time).map(|clip| (track.id, clip)))
        .collect()
}

/// Compose a clip's effects into one filter directive.
///
/// Filter values are space-joined in list order; other kinds contribute
/// nothing. Returns an empty string when there is nothing to apply.
pub fn effective_style(clip: &Clip) -> String {
    clip.effects
        .iter()
        .filter(|effect| effect.kind == EffectKind::Filter)
        .map(|effect| effect.value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl EditorState {
    /// Preview source: first active clip across video tracks at the playhead.
    pub fn active_video_clip(&self) -> Option<&Clip> {
        let time = self.current_time();
        self.tracks()
            .iter()
            .filter(|track| track.kind == TrackKind::Video)
            .find_map(|track| active_clip(track, time))
    }

    /// Pixel geometry for the current zoom.
    pub fn geometry(&self) -> TimelineGeometry {
        TimelineGeometry::from_transport(self.transport())
    }
}

/// Horizontal placement of a clip in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub left: f64,
    pub width: f64,
}

/// Time ↔ pixel mapping at a fixed zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineGeometry {
    /// Pixels per second
    pub zoom: f64,
    pub total_duration: f64,
}

impl TimelineGeometry {
    pub fn new(zoom: f64, total_duration: f64) -> Self {
        Self {
            zoom,
            total_duration,
        }
    }

    pub fn from_transport(transport: &TransportState) -> Self {
        Self::new(transport.zoom, transport.total_duration)
    }

    /// Rendered width of the whole timeline.
    pub fn width(&self) -> f64 {
        self.total_duration * self.zoom
    }

    pub fn time_to_px(&self, time: f64) -> f64 {
        time * self.zoom
    }

    /// Seek target for a click at `px` inside a track's content area.
    pub fn px_to_time(&self, px: f64) -> f64 {
        if self.zoom <= 0.0 {
            return 0.0;
        }
        (px / self.zoom).max(0.0)
    }

    pub fn clip_rect(&self, clip: &Clip) -> ClipRect {
        ClipRect {
            left: self.time_to_px(clip.start),
            width: self.time_to_px(clip.duration),
        }
    }
}
