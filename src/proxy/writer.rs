//! Caller-facing response writer
//!
//! The relay writes streamed responses straight to the caller through
//! [`ResponseWriter`]. [`ChannelWriter`] adapts that to axum: the committed
//! status line travels over a `oneshot`, body chunks over a bounded `mpsc`
//! channel that backs the response body.

use std::convert::Infallible;
use std::io;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Chunks buffered between the relay and the HTTP connection.
/// Keeps the upstream reader at most this many chunks ahead of the client.
const STREAM_CHANNEL_BUFFER: usize = 16;

/// Transport the relay writes a response to.
///
/// Header changes made after [`write_head`](ResponseWriter::write_head) are
/// not sent.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    /// Headers that will accompany the status line
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line and current headers
    async fn write_head(&mut self, status: StatusCode) -> io::Result<()>;

    /// Write a body chunk, committing `200 OK` first if nothing was committed
    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Push buffered bytes to the caller. No-op for transports that deliver
    /// each chunk as it is written.
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Resolves once the caller is gone
    async fn closed(&self);
}

/// Status line and headers committed by a [`ChannelWriter`]
#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Build the axum response, streaming `body`
    pub fn into_response(self, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// [`ResponseWriter`] backed by channels feeding an axum response
pub struct ChannelWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<Bytes>,
}

/// Receiving side of a [`ChannelWriter`]
pub struct ChannelResponse {
    head: oneshot::Receiver<ResponseHead>,
    body: mpsc::Receiver<Bytes>,
}

impl ChannelWriter {
    pub fn new() -> (Self, ChannelResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(STREAM_CHANNEL_BUFFER);
        (
            Self {
                headers: HeaderMap::new(),
                head: Some(head_tx),
                body: body_tx,
            },
            ChannelResponse {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    /// Whether the status line has been committed
    pub fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    /// Headers accumulated but never committed
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }
}

fn disconnected() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

#[async_trait]
impl ResponseWriter for ChannelWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write_head(&mut self, status: StatusCode) -> io::Result<()> {
        let Some(tx) = self.head.take() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "response head already written",
            ));
        };
        let headers = std::mem::take(&mut self.headers);
        tx.send(ResponseHead { status, headers })
            .map_err(|_| disconnected())
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        if !self.is_committed() {
            self.write_head(StatusCode::OK).await?;
        }
        self.body.send(chunk).await.map_err(|_| disconnected())
    }

    async fn closed(&self) {
        self.body.closed().await
    }
}

impl ChannelResponse {
    /// Wait for the committed head. `None` once the writer is dropped
    /// without committing.
    pub async fn head(&mut self) -> Option<ResponseHead> {
        (&mut self.head).await.ok()
    }

    /// Response body yielding every chunk written after the head.
    /// Each chunk is sent as its own frame.
    pub fn into_body(self) -> Body {
        let stream = futures::stream::unfold(self.body, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        Body::from_stream(stream)
    }
}
