//! Editor snapshot files with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use viarte_core::{EditorConfig, Result, ViarteError};

use crate::editor::{EditorState, TransportState};
use crate::track::Track;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned snapshot of an editor's tracks and transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Schema version for migration.
    pub version: u32,
    /// Application version that wrote this file.
    pub app_version: String,
    pub tracks: Vec<Track>,
    pub transport: TransportState,
}

impl ProjectFile {
    /// Snapshot an editor.
    pub fn from_editor(editor: &EditorState) -> Self {
        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            tracks: editor.tracks().to_vec(),
            transport: editor.transport().clone(),
        }
    }

    /// Rebuild an editor from this snapshot. Playback always resumes paused.
    pub fn into_editor(self, config: EditorConfig) -> Result<EditorState> {
        EditorState::from_parts(config, self.tracks, self.transport)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| ViarteError::Serialization(format!("Failed to serialize project: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| ViarteError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(ViarteError::Serialization(format!(
                "Project file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;

        serde_json::from_value(migrated)
            .map_err(|e| ViarteError::Serialization(format!("Failed to parse project: {}", e)))
    }

    /// Save the snapshot to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), tracks = self.tracks.len(), "Saved project");
        Ok(())
    }

    /// Load a snapshot from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 → v1: bare {tracks, transport?} without a header
                let tracks = data
                    .get("tracks")
                    .cloned()
                    .ok_or_else(|| ViarteError::Serialization("v0 project has no tracks".into()))?;
                let transport = data.get("transport").cloned().unwrap_or_else(|| {
                    serde_json::json!({
                        "current_time": 0.0,
                        "total_duration": 30.0,
                        "is_playing": false,
                        "zoom": 50.0,
                        "selected_clip_id": null,
                    })
                });
                data = serde_json::json!({
                    "version": 1,
                    "app_version": "0.1.0",
                    "tracks": tracks,
                    "transport": transport,
                });
                version = 1;
            }
            _ => {
                return Err(ViarteError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{ClipDraft, Effect, Transition, TransitionKind, ClipPatch};
    use crate::track::TrackKind;

    fn sample_editor() -> EditorState {
        let mut editor = EditorState::default();
        let track = editor.first_track(TrackKind::Video).unwrap().id;
        let a = editor
            .add_clip(track, ClipDraft::new().name("Beach").src("media/beach.mp4"))
            .unwrap();
        let b = editor.append_clip(track, ClipDraft::new().name("City")).unwrap();
        editor.add_effect(a, Effect::filter("Blur", "blur(2px)")).unwrap();
        editor
            .update_clip(b, ClipPatch::transition(Transition::new(TransitionKind::Slide, 1.0)))
            .unwrap();
        editor.select_clip(Some(b)).unwrap();
        editor.set_playhead(3.5);
        editor
    }

    #[test]
    fn test_project_roundtrip() {
        let editor = sample_editor();
        let file = ProjectFile::from_editor(&editor);

        let json = file.to_json().unwrap();
        let loaded = ProjectFile::from_json(&json).unwrap();

        assert_eq!(loaded.version, CURRENT_VERSION);
        assert_eq!(loaded.tracks, editor.tracks());
        assert_eq!(loaded.transport, *editor.transport());
    }

    #[test]
    fn test_restored_editor_is_paused() {
        let mut editor = sample_editor();
        editor.set_playing(true);
        let restored = ProjectFile::from_editor(&editor).into_editor(EditorConfig::default()).unwrap();
        assert!(!restored.is_playing());
        assert_eq!(restored.current_time(), 3.5);
        assert_eq!(restored.selected_clip().map(|c| c.name.as_str()), Some("City"));
    }

    #[test]
    fn test_migration_v0() {
        let editor = sample_editor();
        let raw = serde_json::json!({ "tracks": editor.tracks() });
        let data = serde_json::to_vec(&raw).unwrap();

        let loaded = ProjectFile::from_json(&data).unwrap();
        assert_eq!(loaded.version, CURRENT_VERSION);
        assert_eq!(loaded.tracks.len(), 2);
        assert_eq!(loaded.transport.current_time, 0.0);
    }

    #[test]
    fn test_future_version_rejected() {
        let json = serde_json::json!({
            "version": 999,
            "app_version": "99.0.0",
            "tracks": [],
        });
        let data = serde_json::to_vec(&json).unwrap();
        assert!(ProjectFile::from_json(&data).is_err());
    }

    #[test]
    fn test_corrupt_snapshot_is_rejected_on_load() {
        let editor = sample_editor();
        let mut file = ProjectFile::from_editor(&editor);
        file.tracks[0].clips[1].duration = -2.0;
        let loaded = ProjectFile::from_json(&file.to_json().unwrap()).unwrap();
        assert!(loaded.into_editor(EditorConfig::default()).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let file = ProjectFile::from_editor(&sample_editor());
        file.save_to_file(&path).unwrap();

        let loaded = ProjectFile::load_from_file(&path).unwrap();
        assert_eq!(loaded.tracks, file.tracks);
    }
}
