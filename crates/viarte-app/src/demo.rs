//! Scripted end-to-end run: edit, suggest transitions, play, export.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use viarte_ai::{KeywordClassifier, TransitionAdvisor};
use viarte_core::{FrameBuffer, StudioConfig};
use viarte_media::{ChunkSummary, EncoderConfig, GopPolicy, SoftwareBackend, WorkerCoordinator};
use viarte_timeline::{ClipDraft, EditorState, PlaybackLoop, ProjectFile, TrackKind};

const DEMO_CLIPS: [(&str, &str); 3] = [
    ("Forest walk", "media/forest-walk.mp4"),
    ("Downtown traffic", "media/downtown-traffic.mp4"),
    ("Car chase", "media/car-chase.mp4"),
];

const EXPORT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct DemoOptions {
    pub frames: u32,
    pub play_seconds: f64,
    pub output: PathBuf,
    pub project: Option<PathBuf>,
}

pub async fn run(config: &StudioConfig, options: DemoOptions) -> Result<ChunkSummary> {
    let mut editor = EditorState::new(config.editor.clone());
    let track_id = editor
        .first_track(TrackKind::Video)
        .map(|track| track.id)
        .context("editor has no video track")?;

    for (name, src) in DEMO_CLIPS {
        let id = editor.append_clip(track_id, ClipDraft::new().name(name).src(src).duration(5.0))?;
        debug!(clip = %id, name, "Added clip");
    }

    // Smart transitions
    let advisor = Arc::new(TransitionAdvisor::new(
        KeywordClassifier::default(),
        config.advisor.clone(),
    ));
    let track = editor
        .track(track_id)
        .context("video track disappeared")?
        .clone();
    let plan = advisor.suggest_for_track(&track).await;
    for failure in &plan.failures {
        warn!(clip = %failure.clip_id, reason = %failure.reason, "No transition suggested");
    }
    let report = plan.apply(&mut editor);
    for clip in editor.track(track_id).into_iter().flat_map(|t| t.clips_by_start()) {
        let transition = clip.transition.map(|t| t.kind.name()).unwrap_or("-");
        info!(clip = %clip.name, start = clip.start, transition, "Timeline");
    }
    info!(updated = report.updated.len(), "Transitions applied");

    // Playback
    let (stop_tx, stop_rx) = watch::channel(false);
    let play_for = Duration::try_from_secs_f64(options.play_seconds)
        .with_context(|| format!("Invalid play duration {}s", options.play_seconds))?;
    tokio::spawn(async move {
        tokio::time::sleep(play_for).await;
        let _ = stop_tx.send(true);
    });
    editor.set_playing(true);
    let mut playback =
        PlaybackLoop::manual(config.editor.tick_step).context("Invalid editor tick step")?;
    let outcome = playback.run(&mut editor, stop_rx).await;
    editor.set_playing(false);
    info!(
        ?outcome,
        time = editor.current_time(),
        clip = editor.active_video_clip().map(|c| c.name.as_str()).unwrap_or("-"),
        "Playback stopped"
    );

    if let Some(path) = &options.project {
        ProjectFile::from_editor(&editor).save_to_file(path)?;
    }

    // Export
    let encoder_config = EncoderConfig::from(&config.export);
    let (width, height) = (encoder_config.width, encoder_config.height);
    let frames: Vec<FrameBuffer> = (0..options.frames)
        .map(|i| FrameBuffer::test_pattern(width, height, i))
        .collect();
    info!(frames = frames.len(), config = %encoder_config, "Exporting");

    let gop = GopPolicy::new(config.export.gop_size);
    let chunks = tokio::task::spawn_blocking(move || {
        let mut coordinator =
            WorkerCoordinator::new(Arc::new(SoftwareBackend::new())).with_gop(gop);
        coordinator.export(frames, encoder_config, EXPORT_TIMEOUT, |progress| {
            debug!(
                frame = progress.current_frame,
                total = progress.total_frames,
                percent = progress.progress,
                "Export progress"
            );
        })
    })
    .await
    .context("export task panicked")??;

    let summary = ChunkSummary::of(&chunks);
    let json = serde_json::to_vec_pretty(&summary)?;
    std::fs::write(&options.output, json)
        .with_context(|| format!("writing {}", options.output.display()))?;
    info!(
        chunks = summary.chunks,
        key_chunks = summary.key_chunks,
        bytes = summary.bytes,
        output = %options.output.display(),
        "Export summary written"
    );

    Ok(summary)
}
