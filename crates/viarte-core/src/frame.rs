//! Frame buffer types for video frames in CPU memory.
//!
//! A [`FrameBuffer`] is raw pixel storage (the "image" a caller hands in for
//! encoding). A [`VideoFrame`] is a buffer stamped with its presentation time
//! and duration, the unit the codec pipeline consumes and produces.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Result, ViarteError};
use crate::time::FrameRate;

/// Pixel format enumeration. Only packed formats are carried through the
/// pipeline; planar YUV is left to hardware codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit BGRA (32 bits per pixel)
    Bgra8,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Stable numeric tag used in bitstream headers.
    pub fn code(self) -> u8 {
        match self {
            Self::Rgba8 => 0,
            Self::Bgra8 => 1,
            Self::Gray8 => 2,
        }
    }

    /// Inverse of [`PixelFormat::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Rgba8),
            1 => Some(Self::Bgra8),
            2 => Some(Self::Gray8),
            _ => None,
        }
    }

    /// Tightly packed size of a frame in this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel
    pub bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a new zeroed plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        // Align stride to 64 bytes for SIMD and GPU compatibility
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        let data = vec![0u8; stride * height as usize];
        Self {
            data,
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Bytes of pixel data in one row, excluding padding.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.row_bytes();
        &mut self.data[start..end]
    }
}

/// Stand-in returned for a buffer that has lost its planes.
static EMPTY_PLANE: FramePlane = FramePlane {
    data: Vec::new(),
    stride: 0,
    width: 0,
    height: 0,
    bytes_per_pixel: 0,
};

/// A raw image in CPU memory.
///
/// Deserialized buffers are checked with [`FrameBuffer::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFrameBuffer")]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data planes (always one for packed formats)
    pub planes: SmallVec<[FramePlane; 1]>,
}

impl FrameBuffer {
    /// Create a new zeroed frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            planes: smallvec::smallvec![FramePlane::new(width, height, format.bytes_per_pixel())],
        }
    }

    /// Build a frame from tightly packed rows (no stride padding).
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(ViarteError::InvalidParameter(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }

        let mut frame = Self::new(width, height, format);
        if let Some(plane) = frame.primary_plane_mut() {
            let row_bytes = plane.row_bytes();
            if row_bytes > 0 {
                for (y, src) in data.chunks_exact(row_bytes).enumerate() {
                    plane.row_mut(y as u32).copy_from_slice(src);
                }
            }
        }
        Ok(frame)
    }

    /// Check that the primary plane exists and holds every row the frame's
    /// dimensions require.
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: String| Err(ViarteError::InvalidParameter(what));
        let Some(plane) = self.planes.first() else {
            return invalid(format!("{}x{} frame has no planes", self.width, self.height));
        };
        if plane.width != self.width
            || plane.height != self.height
            || plane.bytes_per_pixel != self.format.bytes_per_pixel()
        {
            return invalid(format!(
                "plane {}x{} ({} B/px) does not match {}x{} {:?} frame",
                plane.width, plane.height, plane.bytes_per_pixel, self.width, self.height, self.format
            ));
        }
        if plane.stride < plane.row_bytes() {
            return invalid(format!(
                "stride {} is shorter than a {} byte row",
                plane.stride,
                plane.row_bytes()
            ));
        }
        let needed = match self.height {
            0 => Some(0),
            h => (h as usize - 1)
                .checked_mul(plane.stride)
                .and_then(|n| n.checked_add(plane.row_bytes())),
        };
        match needed {
            Some(needed) if plane.data.len() >= needed => Ok(()),
            _ => invalid(format!(
                "plane holds {} bytes, too few for {}x{} at stride {}",
                plane.data.len(),
                self.width,
                self.height,
                plane.stride
            )),
        }
    }

    /// Copy the pixels out as tightly packed rows.
    pub fn to_packed(&self) -> Vec<u8> {
        let plane = self.primary_plane();
        let mut out = Vec::with_capacity(plane.row_bytes() * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(plane.row(y));
        }
        out
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Get the primary plane (plane 0), or an empty plane if there is none.
    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        self.planes.first().unwrap_or(&EMPTY_PLANE)
    }

    /// Get the primary plane mutably.
    #[inline]
    pub fn primary_plane_mut(&mut self) -> Option<&mut FramePlane> {
        self.planes.first_mut()
    }

    /// A frame filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        if let Some(plane) = frame.primary_plane_mut() {
            for y in 0..height {
                for px in plane.row_mut(y).chunks_exact_mut(4) {
                    px.copy_from_slice(&rgba);
                }
            }
        }
        frame
    }

    /// Create a test pattern frame (color bars), shifted by `phase` bars.
    pub fn test_pattern(width: u32, height: u32, phase: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        if let Some(plane) = frame.primary_plane_mut() {
            for y in 0..height {
                let row = plane.row_mut(y);
                for x in 0..width {
                    let i = (x * 4) as usize;
                    let bar = ((x as u64 * 8 / width as u64) as u32 + phase) % 8;
                    row[i..i + 4].copy_from_slice(&BARS[bar as usize]);
                }
            }
        }
        frame
    }
}

#[derive(Deserialize)]
struct RawFrameBuffer {
    format: PixelFormat,
    width: u32,
    height: u32,
    planes: SmallVec<[FramePlane; 1]>,
}

impl TryFrom<RawFrameBuffer> for FrameBuffer {
    type Error = ViarteError;

    fn try_from(raw: RawFrameBuffer) -> Result<Self> {
        let frame = Self {
            format: raw.format,
            width: raw.width,
            height: raw.height,
            planes: raw.planes,
        };
        frame.validate()?;
        Ok(frame)
    }
}

/// A timestamped frame, the unit of work for encoders and the output of decoders.
///
/// Dropping a `VideoFrame` releases its pixel memory; the pipeline takes
/// frames by value so the buffer is freed as soon as it has been compressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Pixel data
    pub buffer: FrameBuffer,
    /// Presentation timestamp in microseconds
    pub timestamp_us: i64,
    /// Display duration in microseconds
    pub duration_us: i64,
}

impl VideoFrame {
    /// Wrap a buffer with explicit timing.
    pub fn new(buffer: FrameBuffer, timestamp_us: i64, duration_us: i64) -> Self {
        Self {
            buffer,
            timestamp_us,
            duration_us,
        }
    }

    /// Stamp the `index`-th image of a constant-framerate sequence.
    pub fn from_image(buffer: FrameBuffer, index: u64, rate: FrameRate) -> Self {
        Self::new(buffer, rate.timestamp_us(index), rate.frame_duration_us())
    }

    /// Display width in pixels.
    #[inline]
    pub fn display_width(&self) -> u32 {
        self.buffer.width
    }

    /// Display height in pixels.
    #[inline]
    pub fn display_height(&self) -> u32 {
        self.buffer.height
    }
}
