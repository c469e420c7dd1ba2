//! Integration tests for the GPU subsystem.
//!
//! Exercises CPU-side logic only; no GPU required.

use viarte_core::{FrameBuffer, FrameRate, PixelFormat, VideoFrame, ViarteError};
use viarte_gpu::presenter::clamp_surface_size;
use viarte_gpu::texture::{texture_format_for, upload_bytes};
use viarte_gpu::{GpuCapabilities, PresentationSurface};

#[test]
fn decoded_frame_upload_layout_covers_frame() {
    let frame = VideoFrame::from_image(FrameBuffer::test_pattern(100, 50, 3), 3, FrameRate::FPS_30);
    let (bytes, bytes_per_row) = upload_bytes(&frame.buffer);

    let row = frame.display_width() as usize * 4;
    assert!(bytes_per_row as usize >= row);
    let needed = bytes_per_row as usize * (frame.display_height() as usize - 1) + row;
    assert!(bytes.len() >= needed);
}

#[test]
fn gray_frames_share_the_rgba_texture_format() {
    assert_eq!(
        texture_format_for(PixelFormat::Gray8),
        texture_format_for(PixelFormat::Rgba8)
    );
    assert_ne!(
        texture_format_for(PixelFormat::Bgra8),
        texture_format_for(PixelFormat::Rgba8)
    );
}

#[test]
fn surface_size_follows_export_dimensions() {
    assert_eq!(clamp_surface_size(1280, 720, 8192), (1280, 720));
    assert_eq!(clamp_surface_size(16_384, 0, 8192), (8192, 1));
}

#[test]
fn uninitialized_surface_lifecycle() {
    let mut surface = PresentationSurface::new();
    let frame = VideoFrame::from_image(FrameBuffer::solid(8, 8, [0, 0, 0, 255]), 0, FrameRate::FPS_30);

    assert!(matches!(
        surface.render_frame(&frame),
        Err(ViarteError::InvalidState(_))
    ));
    surface.destroy();
    surface.destroy();
    assert!(!surface.is_initialized());
}

#[test]
fn missing_gpu_is_reported_not_raised() {
    let caps = GpuCapabilities::unavailable();
    let json = serde_json::to_value(&caps).unwrap();
    assert_eq!(json["available"], false);
    assert!(json["adapter_name"].is_null());
}
