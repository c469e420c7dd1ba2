//! Integration tests for export: worker, codec pipeline and decoder
//! working together on the software codec.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use viarte_core::{ExportConfig, FrameBuffer, FrameRate, VideoFrame};
use viarte_media::{
    ChunkSummary, ChunkType, DecoderConfig, EncodedChunk, EncoderConfig, FramePipeline,
    GopPolicy, SoftwareBackend, WorkerCoordinator, WorkerEvent, SOFTWARE_CODEC,
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn coordinator() -> WorkerCoordinator {
    WorkerCoordinator::new(Arc::new(SoftwareBackend::new()))
}

fn frames(count: u32) -> Vec<FrameBuffer> {
    (0..count).map(|i| FrameBuffer::test_pattern(64, 36, i)).collect()
}

fn small_config() -> EncoderConfig {
    EncoderConfig::new(SOFTWARE_CODEC, 64, 36)
}

#[test]
fn export_marks_every_thirtieth_frame_as_key() {
    let mut coordinator = coordinator();
    let mut progress = Vec::new();
    let chunks = coordinator
        .export(frames(100), small_config(), TIMEOUT, |p| progress.push(p.current_frame))
        .unwrap();

    assert_eq!(chunks.len(), 100);
    let keys: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.chunk_type == ChunkType::Key)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(keys, [0, 30, 60, 90]);

    assert_eq!(progress, (1..=100).collect::<Vec<usize>>());
}

#[test]
fn coordinator_gop_controls_key_spacing() {
    let mut coordinator = coordinator().with_gop(GopPolicy::new(10));
    let chunks = coordinator
        .export(frames(25), small_config(), TIMEOUT, |_| {})
        .unwrap();
    let keys = chunks.iter().filter(|c| c.is_key()).count();
    assert_eq!(keys, 3);
    assert!(chunks[20].is_key());
}

#[test]
fn export_chunks_keep_submission_order() {
    let mut coordinator = coordinator();
    let chunks = coordinator
        .export(frames(45), small_config(), TIMEOUT, |_| {})
        .unwrap();

    let rate = FrameRate::FPS_30;
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.timestamp_us, rate.timestamp_us(i as u64));
        assert_eq!(chunk.duration_us, rate.frame_duration_us());
    }
    let summary = ChunkSummary::of(&chunks);
    assert_eq!(summary.chunks, 45);
    assert_eq!(summary.key_chunks, 2);
    assert_eq!(summary.duration_us, 45 * rate.frame_duration_us());
}

#[test]
fn exported_chunks_decode_to_the_source_frames() {
    let source = frames(40);
    let mut coordinator = coordinator();
    let chunks = coordinator
        .export(source.clone(), small_config(), TIMEOUT, |_| {})
        .unwrap();

    let decoded: Arc<Mutex<Vec<VideoFrame>>> = Arc::default();
    let sink = Arc::clone(&decoded);
    let mut pipeline = FramePipeline::software();
    pipeline
        .initialize_decoder(
            &DecoderConfig::new(SOFTWARE_CODEC),
            move |frame| sink.lock().push(frame),
            |e| panic!("decode failed: {e}"),
        )
        .unwrap();
    for chunk in chunks {
        pipeline.decode_chunk(chunk).unwrap();
    }
    pipeline.flush_decoder().unwrap();
    pipeline.destroy();

    let decoded = decoded.lock();
    assert_eq!(decoded.len(), source.len());
    for (frame, original) in decoded.iter().zip(&source) {
        assert_eq!(frame.buffer.to_packed(), original.to_packed());
    }
}

#[test]
fn unsupported_codec_is_reported_by_the_worker() {
    let mut coordinator = coordinator();
    let config = EncoderConfig::new("avc1.42001f", 64, 36);
    let err = coordinator
        .export(frames(3), config, TIMEOUT, |_| {})
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("not supported"));
    assert!(err.chunks.is_empty());
    assert!(!coordinator.has_live_worker());

    let chunks = coordinator
        .export(frames(2), small_config(), TIMEOUT, |_| {})
        .unwrap();
    assert_eq!(chunks.len(), 2);
}

#[test]
fn terminated_worker_is_replaced() {
    let mut coordinator = coordinator();
    coordinator.initialize(small_config()).unwrap();
    assert!(matches!(coordinator.next_event(TIMEOUT), Some(WorkerEvent::Ready)));

    coordinator.terminate();
    assert!(!coordinator.has_live_worker());

    let chunks = coordinator
        .export(frames(2), small_config(), TIMEOUT, |_| {})
        .unwrap();
    assert_eq!(chunks.len(), 2);
    assert!(coordinator.has_live_worker());
}

#[test]
fn default_export_config_maps_to_encoder_config() {
    let export = ExportConfig::default();
    let config = EncoderConfig::from(&export);
    assert_eq!(config.codec, SOFTWARE_CODEC);
    assert_eq!((config.width, config.height), (export.width, export.height));

    let mut pipeline = FramePipeline::software();
    let seen: Arc<Mutex<Vec<EncodedChunk>>> = Arc::default();
    let sink = Arc::clone(&seen);
    pipeline
        .initialize_encoder(&config, move |chunk, _| sink.lock().push(chunk.clone()), |_| {})
        .unwrap();
    let frame = VideoFrame::from_image(
        FrameBuffer::solid(export.width, export.height, [255, 0, 0, 255]),
        0,
        export.framerate,
    );
    pipeline.encode_frame(frame, true).unwrap();
    pipeline.flush_encoder().unwrap();
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(pipeline.chunk_count(), 1);
}
