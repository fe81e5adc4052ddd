use super::{PipelineState, CALLER_ADDRESS_HEADER};
use crate::{limiter::RateLimitDecision, Error};
use anyhow::anyhow;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Reject calls from addresses that ran out of tokens.
pub(super) async fn admit(
    State(state): State<PipelineState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(address) = caller_address(request.headers()) else {
        return Error::internal(anyhow!("caller address missing from request metadata"))
            .into_response();
    };

    if state.limiter.allow(&address).await == RateLimitDecision::Limited {
        warn!(caller_address = %address, path = %request.uri().path(), "Rate limit exceeded");
        return Error::RateLimited.into_response();
    }

    next.run(request).await
}

/// The single, non-empty caller address header value.
pub(super) fn caller_address(headers: &HeaderMap) -> Option<String> {
    let mut values = headers.get_all(CALLER_ADDRESS_HEADER).iter();
    let value = values.next()?;
    if values.next().is_some() {
        return None;
    }
    let address = value.to_str().ok()?.trim();
    (!address.is_empty()).then(|| address.to_string())
}
