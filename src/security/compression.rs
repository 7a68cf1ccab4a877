use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::SecurityError;

/// Gzip a request body
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SecurityError::Compression(format!("gzip compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| SecurityError::Compression(format!("gzip finalization failed: {}", e)))
}

/// Inflate a gzip body
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SecurityError::Compression(format!("gzip decompression failed: {}", e)))?;
    Ok(decompressed)
}
