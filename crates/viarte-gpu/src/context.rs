//! GPU context management and capability probing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use viarte_core::{Result, ViarteError};

/// GPU context holding device and queue.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

/// Backends tried on this platform.
pub fn platform_backends() -> wgpu::Backends {
    // Prefer Metal on macOS, Vulkan on others
    #[cfg(target_os = "macos")]
    let backends = wgpu::Backends::METAL;
    #[cfg(not(target_os = "macos"))]
    let backends = wgpu::Backends::VULKAN | wgpu::Backends::DX12;
    backends
}

/// Create an instance for the platform backends.
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: platform_backends(),
        ..Default::default()
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Option<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
}

impl GpuContext {
    /// Create a headless GPU context.
    pub async fn new() -> Result<Self> {
        Self::with_instance(create_instance(), None).await
    }

    /// Create a context on `instance` whose adapter can present to
    /// `compatible_surface`.
    pub async fn with_instance(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = request_adapter(&instance, compatible_surface)
            .await
            .ok_or_else(|| ViarteError::Gpu("No suitable GPU adapter found".to_string()))?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viarte Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: 8192,
                        ..wgpu::Limits::default()
                    }
                    .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| ViarteError::Gpu(format!("Failed to create device: {}", e)))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Create a headless GPU context (blocking version).
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Get adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }
}

/// What the current runtime offers for accelerated presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuCapabilities {
    pub available: bool,
    pub adapter_name: Option<String>,
    pub backend: Option<String>,
}

impl GpuCapabilities {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            available: true,
            adapter_name: Some(info.name.clone()),
            backend: Some(format!("{:?}", info.backend).to_lowercase()),
        }
    }
}

/// Look for a usable adapter. A missing GPU is reported, not raised.
pub fn probe_gpu() -> GpuCapabilities {
    let instance = create_instance();
    match pollster::block_on(request_adapter(&instance, None)) {
        Some(adapter) => {
            let caps = GpuCapabilities::from_info(&adapter.get_info());
            info!(adapter = ?caps.adapter_name, backend = ?caps.backend, "GPU available");
            caps
        }
        None => {
            warn!("Hardware acceleration unavailable: no GPU adapter");
            GpuCapabilities::unavailable()
        }
    }
}

/// Shorthand for `probe_gpu().available`.
pub fn hardware_acceleration_available() -> bool {
    probe_gpu().available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_has_no_adapter() {
        let caps = GpuCapabilities::unavailable();
        assert!(!caps.available);
        assert!(caps.adapter_name.is_none());
        assert!(caps.backend.is_none());
    }

    #[test]
    fn test_platform_backends_not_empty() {
        assert!(!platform_backends().is_empty());
    }
}
