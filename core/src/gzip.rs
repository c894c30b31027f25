//! Whole-body gzip decompression.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::RequestError;

const SCRATCH_SIZE: usize = 16 * 1024;

/// Inflate a complete gzip member into memory, pumping the decoder through
/// a fixed scratch buffer. The decoder is dropped on every path.
pub fn gzip_inflate(compressed: &[u8]) -> Result<Vec<u8>, RequestError> {
    if compressed.is_empty() {
        return Ok(Vec::new());
    }

    let mut decoder = GzDecoder::new(compressed);
    let mut scratch = vec![0u8; SCRATCH_SIZE];
    let mut inflated = Vec::with_capacity(compressed.len().saturating_mul(2));
    loop {
        let produced = decoder
            .read(&mut scratch)
            .map_err(|e| RequestError::Gzip(e.to_string()))?;
        if produced == 0 {
            return Ok(inflated);
        }
        inflated.extend_from_slice(&scratch[..produced]);
    }
}
