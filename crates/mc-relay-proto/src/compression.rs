//! zlib compression for frame payloads.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtoError;

/// Compress a packet body with zlib at the default level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ProtoError::CompressError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtoError::CompressError(e.to_string()))
}

/// Inflate a zlib payload that must expand to exactly `expected_len` bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, ProtoError> {
    let mut output = Vec::with_capacity(expected_len);
    // Read one byte past the expectation so oversized payloads are detected.
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| ProtoError::DecompressError(e.to_string()))?;
    if output.len() != expected_len {
        return Err(ProtoError::DecompressError(format!(
            "declared {expected_len} bytes, inflated to {}",
            output.len()
        )));
    }
    Ok(output)
}
