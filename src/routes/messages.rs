//! Messages endpoint
//!
//! `POST /v1/messages`: relays the request to the upstream Messages API.
//! Buffered responses come back from the relay as a structured result;
//! streamed responses are written by the relay while this handler has
//! already returned the response head to axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{
    proxy::{ChannelWriter, RelayOutcome},
    response::ApiResponse,
    routes::metrics::record_request,
    AppState,
};

/// Handle Messages API requests
pub async fn messages(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let start_time = Instant::now();
    let (mut writer, mut channel) = ChannelWriter::new();

    // The relay runs on its own task so a stream keeps flowing after this
    // handler returns. Dropping `channel` (client gone) is what cancels it.
    let relay = state.relay.clone();
    let task = tokio::spawn(async move {
        let outcome = relay.handle(request, &mut writer).await;
        (outcome, writer.into_headers())
    });

    if let Some(head) = channel.head().await {
        record_request("streaming", head.status.as_u16(), start_time.elapsed().as_secs_f64());
        return head.into_response(channel.into_body());
    }

    match task.await {
        Ok((RelayOutcome::Pending(api_response), headers)) => {
            record_request(
                "buffered",
                api_response.status.as_u16(),
                start_time.elapsed().as_secs_f64(),
            );
            let mut response = api_response.into_response();
            response.headers_mut().extend(headers);
            response
        }
        Ok((RelayOutcome::Handled { .. }, _)) => {
            // Handled always commits a head first, except when the caller
            // vanished before it could be sent.
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(error = %e, "Relay task failed");
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                .into_response()
        }
    }
}
