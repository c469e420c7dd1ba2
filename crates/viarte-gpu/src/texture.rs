//! GPU texture management.

use std::borrow::Cow;

use viarte_core::{FrameBuffer, PixelFormat, Result, ViarteError};

/// Texture format a frame of `format` is uploaded as. Gray frames are
/// expanded to RGBA before upload.
pub fn texture_format_for(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8 | PixelFormat::Gray8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8UnormSrgb,
    }
}

/// Pixel bytes and row pitch to upload for `frame`.
///
/// Packed four-byte formats are borrowed as-is, stride padding included.
/// Gray frames are expanded to tightly packed RGBA.
pub fn upload_bytes(frame: &FrameBuffer) -> (Cow<'_, [u8]>, u32) {
    let plane = frame.primary_plane();
    match frame.format {
        PixelFormat::Rgba8 | PixelFormat::Bgra8 => (Cow::Borrowed(&plane.data), plane.stride as u32),
        PixelFormat::Gray8 => {
            let mut rgba = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
            for y in 0..frame.height {
                for &v in plane.row(y) {
                    rgba.extend_from_slice(&[v, v, v, 255]);
                }
            }
            (Cow::Owned(rgba), frame.width * 4)
        }
    }
}

/// Reject extents wgpu cannot allocate: zero-sized or wider/taller than
/// `max_dimension`.
pub fn check_texture_extent(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ViarteError::Gpu(format!(
            "Cannot create a {}x{} texture",
            width, height
        )));
    }
    if width > max_dimension || height > max_dimension {
        return Err(ViarteError::Gpu(format!(
            "Frame size {}x{} exceeds the device limit of {}",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// A GPU texture that can hold video frame data.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Create a new GPU texture with the given dimensions.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Create a sampled texture sized and formatted for `frame`.
    ///
    /// Fails before touching the device when the frame is malformed or its
    /// extent is outside the device limits.
    pub fn for_frame(device: &wgpu::Device, frame: &FrameBuffer) -> Result<Self> {
        frame.validate()?;
        check_texture_extent(
            frame.width,
            frame.height,
            device.limits().max_texture_dimension_2d,
        )?;
        Ok(Self::new(
            device,
            frame.width,
            frame.height,
            texture_format_for(frame.format),
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            Some("Video Frame Texture"),
        ))
    }

    /// Upload a FrameBuffer to this texture.
    pub fn upload_frame(&self, queue: &wgpu::Queue, frame: &FrameBuffer) -> Result<()> {
        if texture_format_for(frame.format) != self.format {
            return Err(ViarteError::Gpu(format!(
                "Frame format {:?} doesn't match texture format {:?}",
                frame.format, self.format
            )));
        }

        if frame.width != self.width || frame.height != self.height {
            return Err(ViarteError::Gpu(format!(
                "Frame size {}x{} doesn't match texture size {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let (bytes, bytes_per_row) = upload_bytes(frame);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    /// Release the GPU memory now rather than on drop.
    pub fn destroy(self) {
        self.texture.destroy();
    }

    /// Memory usage estimate in bytes.
    pub fn memory_size(&self) -> usize {
        (self.width * self.height) as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping() {
        assert_eq!(texture_format_for(PixelFormat::Rgba8), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(texture_format_for(PixelFormat::Bgra8), wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(texture_format_for(PixelFormat::Gray8), wgpu::TextureFormat::Rgba8UnormSrgb);
    }

    #[test]
    fn test_extent_checks() {
        assert!(check_texture_extent(1920, 1080, 8192).is_ok());
        assert!(check_texture_extent(8192, 1, 8192).is_ok());
        for (w, h) in [(0, 0), (0, 10), (10, 0), (8193, 10), (10, 8193)] {
            let err = check_texture_extent(w, h, 8192).unwrap_err();
            assert!(matches!(err, ViarteError::Gpu(_)), "{}x{}", w, h);
        }
    }

    #[test]
    fn test_rgba_upload_keeps_stride() {
        let frame = FrameBuffer::solid(3, 2, [10, 20, 30, 255]);
        let (bytes, pitch) = upload_bytes(&frame);
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(pitch as usize, frame.primary_plane().stride);
        assert_eq!(&bytes[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_gray_upload_expands_to_rgba() {
        let mut frame = FrameBuffer::new(2, 2, PixelFormat::Gray8);
        frame.primary_plane_mut().unwrap().row_mut(1).copy_from_slice(&[7, 9]);
        let (bytes, pitch) = upload_bytes(&frame);
        assert_eq!(pitch, 8);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..], &[7, 7, 7, 255, 9, 9, 9, 255]);
    }
}
