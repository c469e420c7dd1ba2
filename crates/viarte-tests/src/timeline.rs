//! Integration tests for the timeline subsystem.
//!
//! Exercises cross-crate interactions between viarte-core,
//! viarte-timeline and viarte-ai.

use std::sync::Arc;

use viarte_ai::{KeywordClassifier, RandomClassifier, TransitionAdvisor};
use viarte_core::{AdvisorConfig, EditorConfig};
use viarte_timeline::{
    ClipDraft, EditorState, PlaybackLoop, ProjectFile, RunOutcome, TrackKind, TransitionKind,
};

// ── Helpers ────────────────────────────────────────────────────

fn empty_editor() -> EditorState {
    EditorState::new(EditorConfig {
        default_tracks: false,
        ..EditorConfig::default()
    })
}

/// One video track with three 5s clips appended back to back.
fn three_clip_editor(names: [&str; 3]) -> (EditorState, uuid::Uuid, Vec<uuid::Uuid>) {
    let mut editor = empty_editor();
    let track = editor.add_track(TrackKind::Video);
    let ids = names
        .iter()
        .map(|name| {
            editor
                .append_clip(track, ClipDraft::new().name(*name).src("media/clip.mp4").duration(5.0))
                .unwrap()
        })
        .collect();
    (editor, track, ids)
}

// ── Smart transitions ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn smart_transitions_on_three_clips() {
    let (mut editor, track, ids) = three_clip_editor(["One", "Two", "Three"]);

    let starts: Vec<f64> = ids
        .iter()
        .map(|id| editor.find_clip(*id).unwrap().start)
        .collect();
    assert_eq!(starts, [0.0, 5.0, 10.0]);

    let advisor = Arc::new(TransitionAdvisor::new(
        RandomClassifier::seeded(7),
        AdvisorConfig::default(),
    ));
    let plan = advisor
        .suggest_for_track(editor.track(track).unwrap())
        .await;
    assert!(plan.failures.is_empty());
    let report = plan.apply(&mut editor);
    assert_eq!(report.updated.len(), 2);

    assert!(editor.find_clip(ids[0]).unwrap().transition.is_none());
    for id in &ids[1..] {
        let transition = editor.find_clip(*id).unwrap().transition.unwrap();
        assert!(TransitionKind::VISIBLE.contains(&transition.kind));
        assert_eq!(transition.duration, 1.0);
    }
}

#[tokio::test(start_paused = true)]
async fn keyword_transitions_follow_content() {
    let (mut editor, track, ids) =
        three_clip_editor(["Forest walk", "Mountain lake", "Car chase"]);

    let advisor = Arc::new(TransitionAdvisor::new(
        KeywordClassifier::default(),
        AdvisorConfig::default(),
    ));
    let plan = advisor
        .suggest_for_track(editor.track(track).unwrap())
        .await;
    plan.apply(&mut editor);

    let kind = |i: usize| editor.find_clip(ids[i]).unwrap().transition.map(|t| t.kind);
    assert_eq!(kind(0), None);
    assert_eq!(kind(1), Some(TransitionKind::Fade));
    assert_eq!(kind(2), Some(TransitionKind::Glitch));
}

// ── Playback ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn playback_crosses_clips_and_stops_at_end() {
    let (mut editor, _, ids) = three_clip_editor(["A", "B", "C"]);
    editor.set_total_duration(15.0).unwrap();
    editor.set_playhead(4.5);
    editor.set_playing(true);

    let (_tx, rx) = tokio::sync::watch::channel(false);
    let mut playback = PlaybackLoop::manual(0.5).unwrap();
    let outcome = playback.run(&mut editor, rx).await;

    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(editor.current_time(), 15.0);
    assert!(!editor.is_playing());
    assert!(editor.active_video_clip().is_none());

    editor.set_playhead(5.0);
    assert_eq!(editor.active_video_clip().map(|c| c.id), Some(ids[1]));
}

// ── Persistence ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn project_file_keeps_suggested_transitions() {
    let (mut editor, track, ids) = three_clip_editor(["Beach", "City", "Night"]);
    let advisor = Arc::new(TransitionAdvisor::new(
        KeywordClassifier::default(),
        AdvisorConfig::default(),
    ));
    let plan = advisor
        .suggest_for_track(editor.track(track).unwrap())
        .await;
    plan.apply(&mut editor);
    editor.select_clip(Some(ids[2])).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");
    ProjectFile::from_editor(&editor).save_to_file(&path).unwrap();

    let restored = ProjectFile::load_from_file(&path)
        .unwrap()
        .into_editor(EditorConfig::default())
        .unwrap();
    assert_eq!(restored.tracks(), editor.tracks());
    assert_eq!(restored.selected_clip().map(|c| c.id), Some(ids[2]));
    let kind = |i: usize| restored.find_clip(ids[i]).unwrap().transition.map(|t| t.kind);
    assert_eq!(kind(1), Some(TransitionKind::Zoom));
    assert_eq!(kind(2), Some(TransitionKind::Slide));
}

#[test]
fn removing_selected_clip_clears_selection() {
    let (mut editor, _, ids) = three_clip_editor(["A", "B", "C"]);
    editor.select_clip(Some(ids[1])).unwrap();
    editor.remove_clip(ids[1]).unwrap();

    assert!(editor.selected_clip_id().is_none());
    assert!(editor.selected_clip().is_none());
    assert!(editor.remove_clip(ids[1]).is_err());
}
