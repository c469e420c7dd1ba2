//! Viarte GPU - wgpu-based frame presentation
//!
//! Uses Metal backend on macOS, Vulkan or DX12 elsewhere.

pub mod context;
pub mod pipeline;
pub mod presenter;
pub mod texture;

pub use context::{hardware_acceleration_available, probe_gpu, GpuCapabilities, GpuContext};
pub use pipeline::BlitPipeline;
pub use presenter::PresentationSurface;
pub use texture::GpuTexture;
