use super::json_body;
use crate::{
    access::AccessService,
    api::types::{RoleCheckResponse, UserIdRequest},
    error::ErrorBody,
    Error,
};
use axum::{extract::rejection::JsonRejection, Extension, Json};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/roles/is-admin",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Whether the account holds admin.", body = RoleCheckResponse),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn is_admin(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<RoleCheckResponse>, Error> {
    let request = json_body(payload)?;
    let user_id = request.validate()?;
    let granted = access.is_admin(user_id).await?;
    Ok(Json(RoleCheckResponse {
        user_id: user_id.to_string(),
        granted,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/roles/is-moderator",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Whether the account holds moderator.", body = RoleCheckResponse),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "roles"
)]
pub async fn is_moderator(
    access: Extension<Arc<AccessService>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<RoleCheckResponse>, Error> {
    let request = json_body(payload)?;
    let user_id = request.validate()?;
    let granted = access.is_moderator(user_id).await?;
    Ok(Json(RoleCheckResponse {
        user_id: user_id.to_string(),
        granted,
    }))
}
