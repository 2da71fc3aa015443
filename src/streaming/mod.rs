//! Incremental body copy for streamed responses
//!
//! Moves bytes from the upstream body to the caller as they arrive, in
//! chunks of at most [`COPY_CHUNK_SIZE`], flushing after each one.

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::proxy::ResponseWriter;

/// Largest chunk written to the caller in one go (32 KiB)
pub const COPY_CHUNK_SIZE: usize = 32 * 1024;

/// Why a copy stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEnd {
    /// Upstream body finished
    Eof,
    /// Writing to the caller failed or the caller went away
    ClientClosed,
    /// Reading the upstream body failed
    UpstreamError,
}

/// Summary of a finished copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub bytes: u64,
    pub chunks: usize,
    pub end: CopyEnd,
}

/// Copy `upstream` into `writer` until the upstream ends, the caller goes
/// away, or either side fails. Failures end the copy; they are never
/// returned, since the response head is already committed.
pub async fn copy_stream<S, E, W>(mut upstream: S, writer: &mut W) -> CopyReport
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    W: ResponseWriter,
{
    let mut bytes = 0u64;
    let mut chunks = 0usize;

    let end = 'copy: loop {
        let next = tokio::select! {
            next = upstream.next() => next,
            _ = writer.closed() => break 'copy CopyEnd::ClientClosed,
        };

        let mut chunk = match next {
            None => break CopyEnd::Eof,
            Some(Err(e)) => {
                debug!(error = %e, "Upstream stream read failed");
                break CopyEnd::UpstreamError;
            }
            Some(Ok(chunk)) => chunk,
        };

        while !chunk.is_empty() {
            let piece = chunk.split_to(chunk.len().min(COPY_CHUNK_SIZE));
            let len = piece.len() as u64;

            if let Err(e) = writer.write(piece).await {
                debug!(error = %e, "Client write failed");
                break 'copy CopyEnd::ClientClosed;
            }
            if let Err(e) = writer.flush().await {
                debug!(error = %e, "Client flush failed");
                break 'copy CopyEnd::ClientClosed;
            }

            bytes += len;
            chunks += 1;
        }
    };

    CopyReport { bytes, chunks, end }
}
