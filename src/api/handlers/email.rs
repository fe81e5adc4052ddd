use super::json_body;
use crate::{
    access::{AccessService, Caller},
    api::types::{ConfirmEmailRequest, UserIdRequest},
    error::ErrorBody,
    Error,
};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/email/request-confirmation",
    request_body = UserIdRequest,
    responses(
        (status = 204, description = "Confirmation message sent."),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
        (status = 403, description = "Target is not the caller.", body = ErrorBody),
        (status = 404, description = "Account not found.", body = ErrorBody),
        (status = 409, description = "Already confirmed or a challenge is outstanding.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "email"
)]
pub async fn request_confirmation(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    let user_id = request.validate()?;

    access
        .request_email_confirmation(caller.as_deref(), user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/email/confirm",
    request_body = ConfirmEmailRequest,
    responses(
        (status = 204, description = "Email confirmed."),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
        (status = 404, description = "Account not found.", body = ErrorBody),
        (status = 412, description = "Token is invalid, used or expired.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "email"
)]
pub async fn confirm(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<ConfirmEmailRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    request.validate()?;

    access
        .confirm_email(request.user_id.trim(), request.token.trim())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
