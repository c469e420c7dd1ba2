//! Software codec backend with the lossless `rle1` codec.
//!
//! Bitstream per chunk:
//!
//! ```text
//! "RLE1" | format:u8 | flags:u8 | width:u32le | height:u32le | packbits payload
//! ```
//!
//! Key chunks carry the packed pixels. Delta chunks carry the pixels XORed
//! with the previous frame, which is mostly zeros for slow-moving content.

use tracing::debug;
use viarte_core::{FrameBuffer, PixelFormat, Result, VideoFrame, ViarteError};

use crate::backend::{CodecBackend, Support, VideoDecoderImpl, VideoEncoderImpl};
use crate::chunk::{ChunkType, EncodedChunk};
use crate::config::{DecoderConfig, EncoderConfig};

/// Codec string of the software codec.
pub const SOFTWARE_CODEC: &str = "rle1";

const MAGIC: &[u8; 4] = b"RLE1";
const HEADER_LEN: usize = 14;
const FLAG_KEY: u8 = 0x01;
const MAX_DIMENSION: u32 = 8192;

/// CPU codec backend. Encodes and decodes `rle1` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CodecBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn native_codecs(&self) -> &[&'static str] {
        &[SOFTWARE_CODEC]
    }

    fn encoder_support(&self, config: &EncoderConfig) -> Support {
        if config.codec != SOFTWARE_CODEC {
            return Support::no(format!(
                "codec '{}' is not available in the software backend",
                config.codec
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Support::no("width and height must be non-zero");
        }
        if config.width > MAX_DIMENSION || config.height > MAX_DIMENSION {
            return Support::no(format!(
                "{}x{} exceeds the {} pixel limit",
                config.width, config.height, MAX_DIMENSION
            ));
        }
        if config.bitrate == 0 {
            return Support::no("bitrate must be non-zero");
        }
        if !config.framerate.is_valid() {
            return Support::no(format!("invalid framerate {}", config.framerate));
        }
        Support::yes()
    }

    fn decoder_support(&self, config: &DecoderConfig) -> Support {
        if config.codec != SOFTWARE_CODEC {
            return Support::no(format!(
                "codec '{}' is not available in the software backend",
                config.codec
            ));
        }
        Support::yes()
    }

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoderImpl>> {
        Ok(Box::new(SoftwareEncoder::new(config.clone())))
    }

    fn create_decoder(&self, config: &DecoderConfig) -> Result<Box<dyn VideoDecoderImpl>> {
        Ok(Box::new(SoftwareDecoder::new(config.clone())))
    }
}

/// Reference frame kept between chunks.
struct Reference {
    format: PixelFormat,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Reference {
    fn matches(&self, format: PixelFormat, width: u32, height: u32) -> bool {
        self.format == format && self.width == width && self.height == height
    }
}

/// `rle1` encoder.
pub struct SoftwareEncoder {
    config: EncoderConfig,
    reference: Option<Reference>,
    frames_encoded: u64,
}

impl SoftwareEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            reference: None,
            frames_encoded: 0,
        }
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}

impl VideoEncoderImpl for SoftwareEncoder {
    fn encode(&mut self, frame: &VideoFrame, key_frame: bool) -> Result<Vec<EncodedChunk>> {
        let buffer = &frame.buffer;
        if buffer.width != self.config.width || buffer.height != self.config.height {
            return Err(ViarteError::Encoder(format!(
                "frame is {}x{}, encoder is configured for {}x{}",
                buffer.width, buffer.height, self.config.width, self.config.height
            )));
        }

        buffer
            .validate()
            .map_err(|e| ViarteError::Encoder(e.to_string()))?;
        let pixels = buffer.to_packed();
        let reference = self
            .reference
            .as_ref()
            .filter(|r| r.matches(buffer.format, buffer.width, buffer.height));

        let delta: Option<Vec<u8>> = match reference {
            Some(reference) if !key_frame => Some(
                pixels
                    .iter()
                    .zip(&reference.pixels)
                    .map(|(a, b)| a ^ b)
                    .collect(),
            ),
            _ => None,
        };
        let chunk_type = if delta.is_some() {
            ChunkType::Delta
        } else {
            ChunkType::Key
        };

        let mut data = Vec::with_capacity(HEADER_LEN + pixels.len() / 4);
        data.extend_from_slice(MAGIC);
        data.push(buffer.format.code());
        data.push(if chunk_type == ChunkType::Key { FLAG_KEY } else { 0 });
        data.extend_from_slice(&buffer.width.to_le_bytes());
        data.extend_from_slice(&buffer.height.to_le_bytes());
        pack_bits(delta.as_deref().unwrap_or(&pixels), &mut data);

        self.reference = Some(Reference {
            format: buffer.format,
            width: buffer.width,
            height: buffer.height,
            pixels,
        });
        self.frames_encoded += 1;

        Ok(vec![EncodedChunk {
            chunk_type,
            timestamp_us: frame.timestamp_us,
            duration_us: frame.duration_us,
            data,
        }])
    }

    fn flush(&mut self) -> Result<Vec<EncodedChunk>> {
        debug!(frames = self.frames_encoded, "rle1 encoder flushed");
        Ok(Vec::new())
    }

    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            codec: SOFTWARE_CODEC.to_string(),
            coded_width: Some(self.config.width),
            coded_height: Some(self.config.height),
            format: self.reference.as_ref().map(|r| r.format),
        }
    }
}

/// `rle1` decoder.
pub struct SoftwareDecoder {
    config: DecoderConfig,
    reference: Option<Reference>,
}

impl SoftwareDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }
}

impl VideoDecoderImpl for SoftwareDecoder {
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Vec<VideoFrame>> {
        let header = ChunkHeader::parse(&chunk.data)?;

        if let (Some(w), Some(h)) = (self.config.coded_width, self.config.coded_height) {
            if (w, h) != (header.width, header.height) {
                return Err(ViarteError::Decoder(format!(
                    "chunk is {}x{}, decoder is configured for {}x{}",
                    header.width, header.height, w, h
                )));
            }
        }

        let size = (header.width as usize)
            .checked_mul(header.height as usize)
            .and_then(|px| px.checked_mul(header.format.bytes_per_pixel()))
            .ok_or_else(|| ViarteError::Decoder("chunk frame size overflows".into()))?;
        let mut pixels = unpack_bits(&chunk.data[HEADER_LEN..], size)?;

        if !header.key {
            let reference = self
                .reference
                .as_ref()
                .filter(|r| r.matches(header.format, header.width, header.height))
                .ok_or_else(|| {
                    ViarteError::Decoder("delta chunk without a matching key frame".into())
                })?;
            for (px, prev) in pixels.iter_mut().zip(&reference.pixels) {
                *px ^= prev;
            }
        }

        let buffer = FrameBuffer::from_packed(header.width, header.height, header.format, &pixels)?;
        self.reference = Some(Reference {
            format: header.format,
            width: header.width,
            height: header.height,
            pixels,
        });

        Ok(vec![VideoFrame::new(buffer, chunk.timestamp_us, chunk.duration_us)])
    }

    fn flush(&mut self) -> Result<Vec<VideoFrame>> {
        Ok(Vec::new())
    }
}

struct ChunkHeader {
    format: PixelFormat,
    key: bool,
    width: u32,
    height: u32,
}

impl ChunkHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(ViarteError::Decoder("not an rle1 chunk".into()));
        }
        let format = PixelFormat::from_code(data[4])
            .ok_or_else(|| ViarteError::Decoder(format!("unknown pixel format code {}", data[4])))?;
        let word = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let (width, height) = (word(6), word(10));
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ViarteError::Decoder(format!(
                "chunk dimensions {}x{} outside 1..={}",
                width, height, MAX_DIMENSION
            )));
        }
        Ok(Self {
            format,
            key: data[5] & FLAG_KEY != 0,
            width,
            height,
        })
    }
}

/// PackBits run-length coding.
///
/// Header byte `h`: `0..=127` copies the next `h + 1` bytes literally,
/// `129..=255` repeats the next byte `257 - h` times.
fn pack_bits(input: &[u8], out: &mut Vec<u8>) {
    let n = input.len();
    let mut i = 0;
    while i < n {
        let mut run = 1;
        while i + run < n && run < 128 && input[i + run] == input[i] {
            run += 1;
        }

        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(input[i]);
            i += run;
            continue;
        }

        let start = i;
        i += 1;
        while i < n && i - start < 128 {
            if i + 1 < n && input[i] == input[i + 1] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&input[start..i]);
    }
}

fn unpack_bits(input: &[u8], expected: usize) -> Result<Vec<u8>> {
    let corrupt = || ViarteError::Decoder("corrupt rle1 payload".into());
    // A two-byte run expands to at most 128 bytes.
    let mut out = Vec::with_capacity(expected.min(input.len().saturating_mul(64)));
    let mut i = 0;
    while i < input.len() {
        let h = input[i] as usize;
        i += 1;
        if h < 128 {
            let end = i + h + 1;
            let literal = input.get(i..end).ok_or_else(corrupt)?;
            out.extend_from_slice(literal);
            i = end;
        } else if h > 128 {
            let value = *input.get(i).ok_or_else(corrupt)?;
            out.resize(out.len() + (257 - h), value);
            i += 1;
        }
        if out.len() > expected {
            return Err(corrupt());
        }
    }
    if out.len() != expected {
        return Err(corrupt());
    }
    Ok(out)
}
