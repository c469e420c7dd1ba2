//! Encoded chunk types.

use serde::{Deserialize, Serialize};

use crate::config::DecoderConfig;

/// Whether a chunk decodes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Key,
    Delta,
}

/// One compressed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedChunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    /// Presentation timestamp in microseconds
    pub timestamp_us: i64,
    /// Duration in microseconds
    pub duration_us: i64,
    pub data: Vec<u8>,
}

impl EncodedChunk {
    #[inline]
    pub fn is_key(&self) -> bool {
        self.chunk_type == ChunkType::Key
    }

    #[inline]
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }
}

/// Side data delivered with an output chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Set on the first key chunk of a session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder_config: Option<DecoderConfig>,
}

/// Totals over a chunk list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSummary {
    pub chunks: usize,
    pub key_chunks: usize,
    pub bytes: usize,
    /// Sum of chunk durations in microseconds
    pub duration_us: i64,
}

impl ChunkSummary {
    pub fn of(chunks: &[EncodedChunk]) -> Self {
        chunks.iter().fold(Self::default(), |mut acc, chunk| {
            acc.chunks += 1;
            acc.key_chunks += usize::from(chunk.is_key());
            acc.bytes += chunk.byte_length();
            acc.duration_us += chunk.duration_us;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(chunk_type: ChunkType, len: usize) -> EncodedChunk {
        EncodedChunk {
            chunk_type,
            timestamp_us: 0,
            duration_us: 33_333,
            data: vec![0; len],
        }
    }

    #[test]
    fn test_summary_totals() {
        let chunks = [
            chunk(ChunkType::Key, 10),
            chunk(ChunkType::Delta, 3),
            chunk(ChunkType::Delta, 2),
        ];
        let summary = ChunkSummary::of(&chunks);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.key_chunks, 1);
        assert_eq!(summary.bytes, 15);
        assert_eq!(summary.duration_us, 99_999);
    }

    #[test]
    fn test_chunk_type_on_wire() {
        let json = serde_json::to_value(chunk(ChunkType::Key, 1)).unwrap();
        assert_eq!(json["type"], "key");
        assert_eq!(json["timestampUs"], 0);
    }
}
