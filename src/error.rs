use crate::{store::StoreError, token};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use utoipa::ToSchema;

/// Service-level error taxonomy surfaced to the wire layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("caller identity missing from request context")]
    NoIdentity,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    FailedPrecondition(String),
    #[error("too many requests")]
    RateLimited,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl Error {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("permission denied".to_string())
    }

    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthenticated(_) | Self::NoIdentity => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::FailedPrecondition(_) => "failed_precondition",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) | Self::NoIdentity => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<token::Error> for Error {
    fn from(err: token::Error) -> Self {
        if err.is_rejection() {
            Self::Unauthenticated(format!("invalid token: {err}"))
        } else {
            Self::Internal(err.into())
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("account not found".to_string()),
            StoreError::AlreadyExists => Self::Conflict("already exists".to_string()),
            StoreError::Backend(err) => Self::Internal(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(source) => {
                error!("Internal failure: {source:#}");
                "internal error".to_string()
            }
            Self::NoIdentity => {
                error!("Request reached a protected operation without a verified identity");
                "unauthenticated".to_string()
            }
            other => {
                info!(kind = other.kind(), "Request rejected: {other}");
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}
