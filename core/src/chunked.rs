//! Decoder for `Transfer-Encoding: chunked` bodies.
//!
//! Each chunk is a hex size line, that many bytes, and a line terminator.
//! A zero-size chunk ends the body. Chunk extensions after `;` are ignored
//! and no trailer headers are parsed.

use crate::cancel::Cancellation;
use crate::error::RequestError;
use crate::http::RequestArgs;
use crate::transport::Transport;

/// Append the decoded chunks to `body`. On failure `body` keeps the chunks
/// decoded so far.
pub fn read_chunked_body(
    transport: &mut dyn Transport,
    args: &RequestArgs,
    cancel: &Cancellation,
    body: &mut Vec<u8>,
) -> Result<(), RequestError> {
    loop {
        let size_line = transport
            .read_line(cancel)
            .map_err(|e| RequestError::ChunkReadError(format!("chunk size line: {e}")))?;
        let size = parse_chunk_size(&size_line)?;

        args.log(&format!("Reading {size} bytes\n"));
        tracing::trace!(size, "reading chunk");

        let chunk = transport
            .read_bytes(size, args.on_progress.as_ref(), cancel)
            .map_err(|e| RequestError::ChunkReadError(e.to_string()))?;
        body.extend_from_slice(&chunk);

        transport
            .read_line(cancel)
            .map_err(|e| RequestError::ChunkReadError(format!("chunk terminator: {e}")))?;

        if size == 0 {
            return Ok(());
        }
    }
}

fn parse_chunk_size(line: &str) -> Result<usize, RequestError> {
    let digits = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16)
        .map_err(|_| RequestError::ChunkReadError(format!("invalid chunk size {line:?}")))
}
