use crate::Error;
use anyhow::anyhow;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use tracing::error;

/// Turn a panic anywhere below into a generic internal error.
pub(super) fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    error!(panic = detail, "Recovered from panic while serving a call");
    Error::internal(anyhow!("recovered from panic")).into_response()
}
