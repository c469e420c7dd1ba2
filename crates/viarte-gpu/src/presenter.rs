//! Presentation surface: shows one decoded frame at a time.
//!
//! Every [`PresentationSurface::render_frame`] call allocates a texture for
//! the frame, draws it with the blit pipeline, presents and frees the
//! texture again. Only one frame is ever resident.

use tracing::{debug, info, warn};
use viarte_core::{Result, VideoFrame, ViarteError};

use crate::context::{create_instance, GpuContext};
use crate::pipeline::BlitPipeline;
use crate::texture::GpuTexture;

/// Clamp a requested surface size to something configurable.
pub fn clamp_surface_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max = max_dimension.max(1);
    (width.clamp(1, max), height.clamp(1, max))
}

/// Pick the presentation format: first sRGB format, else the first offered.
pub fn preferred_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first().copied())
}

struct Presenter {
    context: GpuContext,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pipeline: BlitPipeline,
}

impl Presenter {
    fn reconfigure(&self) {
        self.surface.configure(&self.context.device, &self.config);
    }

    fn max_dimension(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }
}

/// A window-backed surface that displays decoded frames.
#[derive(Default)]
pub struct PresentationSurface {
    presenter: Option<Presenter>,
    frames_presented: u64,
}

impl PresentationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.presenter.is_some()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Current surface size, if initialized.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.presenter
            .as_ref()
            .map(|p| (p.config.width, p.config.height))
    }

    /// Acquire a device that can present to `target` and configure the
    /// surface at `width`×`height`. A second call while initialized is a
    /// no-op.
    pub async fn initialize(
        &mut self,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.presenter.is_some() {
            debug!("Presentation surface already initialized");
            return Ok(());
        }

        let instance = create_instance();
        let surface = instance
            .create_surface(target)
            .map_err(|e| ViarteError::Gpu(format!("Failed to create surface: {}", e)))?;
        let context = GpuContext::with_instance(instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&context.adapter);
        let format = preferred_surface_format(&caps.formats)
            .ok_or_else(|| ViarteError::Gpu("Surface offers no texture formats".to_string()))?;
        let (width, height) = clamp_surface_size(
            width,
            height,
            context.device.limits().max_texture_dimension_2d,
        );
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&context.device, &config);

        let pipeline = BlitPipeline::new(&context.device, format);
        info!(width, height, ?format, "Presentation surface initialized");

        self.presenter = Some(Presenter {
            context,
            surface,
            config,
            pipeline,
        });
        Ok(())
    }

    /// Blocking version of [`PresentationSurface::initialize`].
    pub fn initialize_blocking(
        &mut self,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        pollster::block_on(self.initialize(target, width, height))
    }

    /// Follow a window resize.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let presenter = self
            .presenter
            .as_mut()
            .ok_or_else(|| ViarteError::InvalidState("Presentation surface not initialized".into()))?;
        let (width, height) = clamp_surface_size(width, height, presenter.max_dimension());
        presenter.config.width = width;
        presenter.config.height = height;
        presenter.reconfigure();
        debug!(width, height, "Presentation surface resized");
        Ok(())
    }

    /// Upload, draw and present one frame, then free its texture.
    pub fn render_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let presenter = self
            .presenter
            .as_ref()
            .ok_or_else(|| ViarteError::InvalidState("Presentation surface not initialized".into()))?;

        let device = &presenter.context.device;
        let texture = GpuTexture::for_frame(device, &frame.buffer)?;
        texture.upload_frame(&presenter.context.queue, &frame.buffer)?;

        let output = match presenter.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                presenter.reconfigure();
                presenter
                    .surface
                    .get_current_texture()
                    .map_err(|e| ViarteError::Gpu(format!("Surface unavailable: {}", e)))?
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!(timestamp_us = frame.timestamp_us, "Surface timeout, frame skipped");
                texture.destroy();
                return Ok(());
            }
            Err(e) => {
                texture.destroy();
                return Err(ViarteError::Gpu(format!("Surface error: {}", e)));
            }
        };

        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = presenter.pipeline.bind(device, &texture.view);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Present Encoder"),
        });
        presenter.pipeline.draw(&mut encoder, &target, &bind_group);
        presenter.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        texture.destroy();

        self.frames_presented += 1;
        Ok(())
    }

    /// Release the device and everything created on it. Safe to call when
    /// never initialized, and more than once.
    pub fn destroy(&mut self) {
        if let Some(presenter) = self.presenter.take() {
            let Presenter {
                context,
                surface,
                pipeline,
                ..
            } = presenter;
            drop(pipeline);
            drop(surface);
            context.device.destroy();
            info!(frames = self.frames_presented, "Presentation surface destroyed");
        }
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        self.destroy();
    }
}
