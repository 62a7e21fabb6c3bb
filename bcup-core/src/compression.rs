/*!
Compression adapters for backup files.

Backups are always gzip. The adapter trait stays so the engine can be exercised
against alternative implementations in tests.
*/

use crate::{BcupError, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

/// Compression abstraction for backup data
pub trait CompressionAdapter {
    /// Compress the input data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress at most `limit` bytes of output.
    ///
    /// Returns the bytes read and whether the stream was cut short. Corrupt
    /// input past what was already read is reported as truncation rather than
    /// an error, so callers that only need best-effort metadata keep going.
    fn decompress_capped(&self, compressed_data: &[u8], limit: usize) -> Result<(Vec<u8>, bool)>;

    /// Get the name of the compression algorithm
    fn algorithm_name(&self) -> &str;
}

/// Gzip compression adapter
///
/// Defaults to level 9, which is what backups have always been written with.
///
/// # Example
/// ```rust
/// use bcup_core::{CompressionAdapter, GzipCompressor};
///
/// let compressor = GzipCompressor::new();
/// let compressed = compressor.compress(b"[]").unwrap();
/// assert_eq!(compressor.decompress(&compressed).unwrap(), b"[]");
/// ```
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    compression_level: Compression,
}

impl GzipCompressor {
    /// Create a new gzip compressor at maximum compression
    pub fn new() -> Self {
        Self {
            compression_level: Compression::best(),
        }
    }

    /// Create a new gzip compressor with the specified compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: Compression::new(level.min(9)),
        }
    }

    /// Create a compressor for fast compression (level 1)
    pub fn fast() -> Self {
        Self::with_level(1)
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.compression_level);

        encoder.write_all(data).map_err(|e| {
            BcupError::compression(format!("Failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| BcupError::compression(format!("Failed to finish compression: {e}")))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(compressed_data);
        let mut decompressed = Vec::new();

        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| BcupError::compression(format!("Failed to decompress data: {e}")))?;

        Ok(decompressed)
    }

    fn decompress_capped(&self, compressed_data: &[u8], limit: usize) -> Result<(Vec<u8>, bool)> {
        let mut decoder = GzDecoder::new(compressed_data);
        let mut decompressed = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            match decoder.read(&mut chunk) {
                Ok(0) => return Ok((decompressed, false)),
                Ok(n) => {
                    decompressed.extend_from_slice(&chunk[..n]);
                    if decompressed.len() > limit {
                        decompressed.truncate(limit);
                        return Ok((decompressed, true));
                    }
                }
                Err(e) if decompressed.is_empty() => {
                    return Err(BcupError::compression(format!(
                        "Failed to decompress data: {e}"
                    )));
                }
                Err(_) => return Ok((decompressed, true)),
            }
        }
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}
