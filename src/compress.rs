use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{BpError, Result};

/// External block compressor, supplied at `Tree::open`. Every on-disk block
/// other than the head is stored through this interface; the core never
/// assumes a particular algorithm.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
    /// Upper bound on the compressed size of `input_len` bytes; used to size
    /// scratch buffers before compressing.
    fn max_compressed_size(&self, input_len: usize) -> usize;
    /// The decompressed length of `data`, without fully decompressing it.
    /// Relied on to recover a leaf value's original length from its
    /// on-disk (compressed) byte count alone.
    fn uncompressed_length(&self, data: &[u8]) -> Result<u64>;
}

/// Default compressor. Uses the gzip container, whose trailing 4-byte
/// ISIZE field records the uncompressed length (mod 2^32) without
/// requiring a full decompression pass to read it.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self { level: Compression::new(level) }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self { level: Compression::fast() }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data).map_err(|e| BpError::Comp(e.to_string()))?;
        encoder.finish().map_err(|e| BpError::Comp(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|e| BpError::Decomp(e.to_string()))?;
        Ok(out)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        // Deflate's worst-case stored-block expansion plus the gzip
        // header (10 bytes) and footer (8 bytes).
        input_len + (input_len / 16_383 + 1) * 5 + 18
    }

    fn uncompressed_length(&self, data: &[u8]) -> Result<u64> {
        if data.len() < 8 {
            return Err(BpError::Decomp("gzip stream too short for ISIZE trailer".into()));
        }
        let tail = &data[data.len() - 4..];
        Ok(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let c = GzipCompressor::default();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = c.compress(&data).unwrap();
        assert!(compressed.len() <= c.max_compressed_size(data.len()));
        let restored = c.decompress(&compressed).unwrap();
        assert_eq!(restored, data);
        assert_eq!(c.uncompressed_length(&compressed).unwrap(), data.len() as u64);
    }

    #[test]
    fn empty_input_round_trips() {
        let c = GzipCompressor::default();
        let compressed = c.compress(&[]).unwrap();
        let restored = c.decompress(&compressed).unwrap();
        assert!(restored.is_empty());
        assert_eq!(c.uncompressed_length(&compressed).unwrap(), 0);
    }
}
