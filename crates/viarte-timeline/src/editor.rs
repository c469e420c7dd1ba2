//! Editor state: the track/clip model plus transport, mutated through a
//! single owner.
//!
//! Operations that reference a track or clip by id return
//! [`ViarteError::NotFound`] when the id is unknown and leave the state
//! untouched. Transport setters clamp instead of failing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use viarte_core::{EditorConfig, Result, ViarteError};

use crate::clip::{Clip, ClipDraft, ClipPatch, Effect};
use crate::track::{Track, TrackKind};

/// Playhead, zoom and selection. Holds clip ids only, never clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    /// Playhead position in seconds (>= 0)
    pub current_time: f64,
    /// Configured timeline length in seconds
    pub total_duration: f64,
    pub is_playing: bool,
    /// Pixels per second
    pub zoom: f64,
    /// Selected clip, resolved by id on demand
    pub selected_clip_id: Option<Uuid>,
}

/// The editing model: tracks own clips, the transport references them by id.
#[derive(Debug, Clone)]
pub struct EditorState {
    config: EditorConfig,
    tracks: Vec<Track>,
    transport: TransportState,
}

impl EditorState {
    /// Create a fresh editor. With `default_tracks` it starts with
    /// "Video 1" and "Audio 1".
    pub fn new(config: EditorConfig) -> Self {
        let transport = TransportState {
            current_time: 0.0,
            total_duration: config.total_duration,
            is_playing: false,
            zoom: config.initial_zoom.clamp(config.min_zoom, config.max_zoom),
            selected_clip_id: None,
        };
        let mut editor = Self {
            config,
            tracks: Vec::new(),
            transport,
        };
        if editor.config.default_tracks {
            editor.tracks.push(Track::new_video("Video 1"));
            editor.tracks.push(Track::new_audio("Audio 1"));
        }
        editor
    }

    /// Rebuild an editor from saved parts.
    ///
    /// Rejects duplicate track or clip ids, invalid clip timing and a
    /// non-positive total duration.
    pub fn from_parts(
        config: EditorConfig,
        tracks: Vec<Track>,
        transport: TransportState,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for track in &tracks {
            if !seen.insert(track.id) {
                return Err(ViarteError::InvalidState(format!("duplicate track id {}", track.id)));
            }
            for clip in &track.clips {
                if !seen.insert(clip.id) {
                    return Err(ViarteError::InvalidState(format!("duplicate clip id {}", clip.id)));
                }
                validate_timing(clip.start, clip.duration, clip.offset)?;
            }
        }

        let mut editor = Self {
            config,
            tracks,
            transport,
        };
        editor.set_total_duration(editor.transport.total_duration)?;
        editor.transport.is_playing = false;
        editor.set_zoom(editor.transport.zoom);
        editor.set_playhead(editor.transport.current_time);
        if let Some(id) = editor.transport.selected_clip_id {
            if editor.find_clip(id).is_none() {
                editor.transport.selected_clip_id = None;
            }
        }
        Ok(editor)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// First track of the given kind.
    pub fn first_track(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    /// Look a clip up across all tracks.
    pub fn find_clip(&self, id: Uuid) -> Option<&Clip> {
        self.tracks
            .iter()
            .find_map(|t| t.find_clip(id).map(|(_, c)| c))
    }

    fn find_clip_mut(&mut self, id: Uuid) -> Option<&mut Clip> {
        self.tracks
            .iter_mut()
            .find_map(|t| t.find_clip_mut(id).map(|(_, c)| c))
    }

    fn track_mut(&mut self, id: Uuid) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ViarteError::NotFound(format!("track {}", id)))
    }

    // ── Model operations ────────────────────────────────────────

    /// Append a track named "{Video|Audio} {n}", n = 1 + current track count.
    pub fn add_track(&mut self, kind: TrackKind) -> Uuid {
        let name = format!("{} {}", kind.label(), self.tracks.len() + 1);
        let track = Track::new(kind, name);
        let id = track.id;
        debug!(track = %id, name = %track.name, "Added track");
        self.tracks.push(track);
        id
    }

    /// Create a clip on `track_id` from a draft and return its new id.
    ///
    /// Defaults: start at the playhead, the configured duration (5s),
    /// offset 0, kind video, name "New Clip".
    pub fn add_clip(&mut self, track_id: Uuid, draft: ClipDraft) -> Result<Uuid> {
        let start = draft.start.unwrap_or(self.transport.current_time);
        let duration = draft.duration.unwrap_or(self.config.default_clip_duration);
        let offset = draft.offset.unwrap_or(0.0);
        validate_timing(start, duration, offset)?;

        let track = self.track_mut(track_id)?;
        let clip = Clip {
            id: Uuid::new_v4(),
            kind: draft.kind.unwrap_or_default(),
            src: draft.src.unwrap_or_default(),
            start,
            duration,
            offset,
            track_id,
            name: draft.name.unwrap_or_else(|| "New Clip".to_string()),
            effects: draft.effects,
            transition: draft.transition,
        };
        let id = clip.id;
        debug!(clip = %id, track = %track_id, start, duration, "Added clip");
        track.clips.push(clip);
        Ok(id)
    }

    /// Add a clip right after the last clip on the track.
    pub fn append_clip(&mut self, track_id: Uuid, draft: ClipDraft) -> Result<Uuid> {
        let end = self
            .track(track_id)
            .map(Track::end_time)
            .ok_or_else(|| ViarteError::NotFound(format!("track {}", track_id)))?;
        self.add_clip(track_id, draft.start(end))
    }

    /// Merge a partial update into the clip with this id.
    pub fn update_clip(&mut self, clip_id: Uuid, patch: ClipPatch) -> Result<()> {
        let clip = self
            .find_clip_mut(clip_id)
            .ok_or_else(|| ViarteError::NotFound(format!("clip {}", clip_id)))?;

        let mut updated = clip.clone();
        updated.apply_patch(patch);
        validate_timing(updated.start, updated.duration, updated.offset)?;
        *clip = updated;
        Ok(())
    }

    /// Append an effect to a clip's effect list.
    pub fn add_effect(&mut self, clip_id: Uuid, effect: Effect) -> Result<()> {
        let clip = self
            .find_clip_mut(clip_id)
            .ok_or_else(|| ViarteError::NotFound(format!("clip {}", clip_id)))?;
        clip.effects.push(effect);
        Ok(())
    }

    /// Remove a clip from whichever track holds it. Clears the selection
    /// when it pointed at this clip.
    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<Clip> {
        let removed = self
            .tracks
            .iter_mut()
            .find_map(|t| t.remove_clip(clip_id))
            .ok_or_else(|| ViarteError::NotFound(format!("clip {}", clip_id)))?;

        if self.transport.selected_clip_id == Some(clip_id) {
            self.transport.selected_clip_id = None;
        }
        debug!(clip = %clip_id, "Removed clip");
        Ok(removed)
    }

    // ── Transport ───────────────────────────────────────────────

    /// Select a clip by id, or clear the selection with `None`.
    pub fn select_clip(&mut self, clip_id: Option<Uuid>) -> Result<()> {
        if let Some(id) = clip_id {
            if self.find_clip(id).is_none() {
                return Err(ViarteError::NotFound(format!("clip {}", id)));
            }
        }
        self.transport.selected_clip_id = clip_id;
        Ok(())
    }

    /// The selected clip, looked up by id.
    pub fn selected_clip(&self) -> Option<&Clip> {
        self.transport
            .selected_clip_id
            .and_then(|id| self.find_clip(id))
    }

    /// Set pixels-per-second, clamped to the configured zoom range.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_nan() {
            return;
        }
        self.transport.zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
    }

    /// Move the playhead; negative times clamp to 0.
    pub fn set_playhead(&mut self, time: f64) {
        self.transport.current_time = if time.is_nan() { 0.0 } else { time.max(0.0) };
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.transport.is_playing = playing;
    }

    /// Change the timeline length ceiling.
    pub fn set_total_duration(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ViarteError::InvalidParameter(format!(
                "total duration must be positive, got {}",
                seconds
            )));
        }
        self.transport.total_duration = seconds;
        Ok(())
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_time
    }

    pub fn total_duration(&self) -> f64 {
        self.transport.total_duration
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing
    }

    pub fn zoom(&self) -> f64 {
        self.transport.zoom
    }

    pub fn selected_clip_id(&self) -> Option<Uuid> {
        self.transport.selected_clip_id
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

fn validate_timing(start: f64, duration: f64, offset: f64) -> Result<()> {
    if !start.is_finite() || start < 0.0 {
        return Err(ViarteError::InvalidParameter(format!(
            "clip start must be >= 0, got {}",
            start
        )));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ViarteError::InvalidParameter(format!(
            "clip duration must be > 0, got {}",
            duration
        )));
    }
    if !offset.is_finite() || offset < 0.0 {
        return Err(ViarteError::InvalidParameter(format!(
            "clip offset must be >= 0, got {}",
            offset
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{ClipKind, EffectKind, Transition, TransitionKind};
    use proptest::prelude::*;

    fn video_track(editor: &EditorState) -> Uuid {
        editor.first_track(TrackKind::Video).unwrap().id
    }

    #[test]
    fn test_default_tracks_and_names() {
        let mut editor = EditorState::default();
        let names: Vec<&str> = editor.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Video 1", "Audio 1"]);

        editor.add_track(TrackKind::Video);
        assert_eq!(editor.tracks()[2].name, "Video 3");
        assert_eq!(editor.tracks()[2].kind, TrackKind::Video);
    }

    #[test]
    fn test_add_clip_defaults() {
        let mut editor = EditorState::default();
        editor.set_playhead(7.0);
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new()).unwrap();

        let clip = editor.find_clip(id).unwrap();
        assert_eq!(clip.start, 7.0);
        assert_eq!(clip.duration, 5.0);
        assert_eq!(clip.offset, 0.0);
        assert_eq!(clip.kind, ClipKind::Video);
        assert_eq!(clip.name, "New Clip");
        assert_eq!(clip.track_id, track);
        assert!(clip.transition.is_none());
    }

    #[test]
    fn test_add_clip_to_unknown_track_leaves_state_alone() {
        let mut editor = EditorState::default();
        let before: Vec<usize> = editor.tracks().iter().map(Track::clip_count).collect();
        let err = editor.add_clip(Uuid::new_v4(), ClipDraft::new()).unwrap_err();
        assert!(matches!(err, ViarteError::NotFound(_)));
        let after: Vec<usize> = editor.tracks().iter().map(Track::clip_count).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_add_clip_rejects_non_positive_duration() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let err = editor
            .add_clip(track, ClipDraft::new().duration(0.0))
            .unwrap_err();
        assert!(matches!(err, ViarteError::InvalidParameter(_)));
    }

    #[test]
    fn test_append_clip_starts_after_last_clip() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        editor.add_clip(track, ClipDraft::new().start(2.0).duration(4.0)).unwrap();
        let id = editor.append_clip(track, ClipDraft::new()).unwrap();
        assert_eq!(editor.find_clip(id).unwrap().start, 6.0);
    }

    #[test]
    fn test_update_clip_merges_fields() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new().name("a")).unwrap();

        editor
            .update_clip(id, ClipPatch::transition(Transition::new(TransitionKind::Fade, 1.0)))
            .unwrap();
        let clip = editor.find_clip(id).unwrap();
        assert_eq!(clip.name, "a");
        assert_eq!(clip.transition, Some(Transition::new(TransitionKind::Fade, 1.0)));

        let err = editor.update_clip(Uuid::new_v4(), ClipPatch::start(1.0)).unwrap_err();
        assert!(matches!(err, ViarteError::NotFound(_)));
    }

    #[test]
    fn test_invalid_update_is_rejected_whole() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new().name("a")).unwrap();
        let patch = ClipPatch {
            name: Some("b".into()),
            duration: Some(-1.0),
            ..ClipPatch::default()
        };
        assert!(editor.update_clip(id, patch).is_err());
        assert_eq!(editor.find_clip(id).unwrap().name, "a");
    }

    #[test]
    fn test_update_rejects_negative_start_and_offset() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new().start(2.0)).unwrap();

        let err = editor.update_clip(id, ClipPatch::start(-1.0)).unwrap_err();
        assert!(matches!(err, ViarteError::InvalidParameter(_)));
        let patch = ClipPatch {
            offset: Some(-0.5),
            ..ClipPatch::default()
        };
        assert!(editor.update_clip(id, patch).is_err());

        let clip = editor.find_clip(id).unwrap();
        assert_eq!(clip.start, 2.0);
        assert_eq!(clip.offset, 0.0);
    }

    #[test]
    fn test_from_parts_rejects_duplicate_clip_ids() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        editor.add_clip(track, ClipDraft::new().start(0.0)).unwrap();
        let mut tracks = editor.tracks().to_vec();
        let copy = tracks[0].clips[0].clone();
        tracks[1].clips.push(copy);

        let err = EditorState::from_parts(EditorConfig::default(), tracks, editor.transport().clone())
            .unwrap_err();
        assert!(matches!(err, ViarteError::InvalidState(_)));
    }

    #[test]
    fn test_from_parts_rejects_zero_total_duration() {
        let editor = EditorState::default();
        let mut transport = editor.transport().clone();
        transport.total_duration = 0.0;
        assert!(EditorState::from_parts(EditorConfig::default(), editor.tracks().to_vec(), transport).is_err());
    }

    #[test]
    fn test_effects_append_in_order() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new()).unwrap();
        editor.add_effect(id, Effect::filter("Sepia", "sepia(1)")).unwrap();
        editor.add_effect(id, Effect::filter("Sepia", "sepia(1)")).unwrap();
        editor
            .add_effect(id, Effect::new(EffectKind::Color, "Warm", 1.2))
            .unwrap();

        let effects = &editor.find_clip(id).unwrap().effects;
        assert_eq!(effects.len(), 3);
        assert_eq!(effects[2].kind, EffectKind::Color);
    }

    #[test]
    fn test_remove_selected_clip_clears_selection() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let id = editor.add_clip(track, ClipDraft::new()).unwrap();
        editor.select_clip(Some(id)).unwrap();
        assert_eq!(editor.selected_clip().map(|c| c.id), Some(id));

        editor.remove_clip(id).unwrap();
        assert_eq!(editor.selected_clip_id(), None);
        assert!(editor.selected_clip().is_none());
    }

    #[test]
    fn test_remove_other_clip_keeps_selection() {
        let mut editor = EditorState::default();
        let track = video_track(&editor);
        let keep = editor.add_clip(track, ClipDraft::new()).unwrap();
        let drop = editor.add_clip(track, ClipDraft::new()).unwrap();
        editor.select_clip(Some(keep)).unwrap();
        editor.remove_clip(drop).unwrap();
        assert_eq!(editor.selected_clip_id(), Some(keep));
    }

    #[test]
    fn test_select_unknown_clip_fails() {
        let mut editor = EditorState::default();
        assert!(editor.select_clip(Some(Uuid::new_v4())).is_err());
        editor.select_clip(None).unwrap();
    }

    #[test]
    fn test_zoom_is_clamped_to_range() {
        let mut editor = EditorState::default();
        editor.set_zoom(500.0);
        assert_eq!(editor.zoom(), 100.0);
        editor.set_zoom(0.1);
        assert_eq!(editor.zoom(), 1.0);
        editor.set_zoom(f64::NAN);
        assert_eq!(editor.zoom(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_negative_playhead_clamps_to_zero(t in -1.0e9f64..0.0) {
            let mut editor = EditorState::default();
            editor.set_playhead(t);
            prop_assert_eq!(editor.current_time(), 0.0);
        }

        #[test]
        fn prop_clip_ids_unique_across_tracks(targets in proptest::collection::vec(0usize..3, 1..60)) {
            let mut editor = EditorState::default();
            editor.add_track(TrackKind::Video);
            let tracks: Vec<Uuid> = editor.tracks().iter().map(|t| t.id).collect();

            let mut ids = HashSet::new();
            for target in targets {
                let id = editor.add_clip(tracks[target], ClipDraft::new()).unwrap();
                prop_assert!(ids.insert(id));
            }
        }
    }
}
