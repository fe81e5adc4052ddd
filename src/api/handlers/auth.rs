use super::json_body;
use crate::{
    access::{AccessService, Session},
    api::types::{AccessTokenResponse, LoginRequest, RefreshRequest, RegisterRequest},
    error::ErrorBody,
    Error,
};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};
use secrecy::SecretString;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; access and refresh assertions.", body = Session),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 409, description = "Email already registered.", body = ErrorBody),
        (status = 412, description = "Called with a bearer credential.", body = ErrorBody),
        (status = 429, description = "Rate limited.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), Error> {
    let request = json_body(payload)?;
    request.validate()?;

    let session = access
        .register(
            request.name.trim(),
            &request.email,
            SecretString::from(request.password),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh assertions.", body = Session),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 401, description = "Wrong email or password.", body = ErrorBody),
        (status = 412, description = "Called with a bearer credential.", body = ErrorBody),
        (status = 429, description = "Rate limited.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Session>, Error> {
    let request = json_body(payload)?;
    request.validate()?;

    let session = access
        .login(&request.email, SecretString::from(request.password))
        .await?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh access assertion.", body = AccessTokenResponse),
        (status = 401, description = "Invalid, expired or non-refresh token.", body = ErrorBody),
        (status = 429, description = "Rate limited.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn refresh(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessTokenResponse>, Error> {
    let request = json_body(payload)?;
    let access_token = access.issue_access_from_refresh(request.refresh_token.trim())?;
    Ok(Json(AccessTokenResponse { access_token }))
}
