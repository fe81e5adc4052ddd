use super::{CALLER_ADDRESS_HEADER, REQUEST_ID_HEADER};
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Log each call with its latency and outcome inside a correlation span.
pub(super) async fn time_call(request: Request, next: Next) -> Response {
    // The header lookup borrows the request, so it must not outlive the span.
    let span = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("none")
                .to_string()
        };
        info_span!(
            "call",
            method = %request.uri().path(),
            caller_address = %header(CALLER_ADDRESS_HEADER),
            request_id = %header(REQUEST_ID_HEADER),
        )
    };

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = response.status();
        let outcome = if status.is_client_error() || status.is_server_error() {
            "error"
        } else {
            "success"
        };

        info!(latency_ms, status = status.as_u16(), outcome, "Call finished");
        response
    }
    .instrument(span)
    .await
}
