use super::json_body;
use crate::{
    access::{AccessService, Caller},
    api::types::{ChangePasswordRequest, SearchUsersRequest, UserIdRequest, UsersResponse},
    error::ErrorBody,
    store::UserProfile,
    Error,
};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};
use secrecy::SecretString;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/users/promote-moderator",
    request_body = UserIdRequest,
    responses(
        (status = 204, description = "Target is now a moderator."),
        (status = 403, description = "Caller is not an admin.", body = ErrorBody),
        (status = 404, description = "Target not found.", body = ErrorBody),
        (status = 409, description = "Target is already a moderator.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn promote_moderator(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    access
        .promote_moderator(caller.as_deref(), request.validate()?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/users/promote-admin",
    request_body = UserIdRequest,
    responses(
        (status = 204, description = "Target is now an admin and a moderator."),
        (status = 403, description = "Caller is not a core-admin.", body = ErrorBody),
        (status = 404, description = "Target not found.", body = ErrorBody),
        (status = 409, description = "Target is already an admin.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn promote_admin(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    access
        .promote_admin(caller.as_deref(), request.validate()?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/users/promote-core-admin",
    request_body = UserIdRequest,
    responses(
        (status = 204, description = "Target is now a core-admin."),
        (status = 403, description = "Caller is not a core-admin.", body = ErrorBody),
        (status = 404, description = "Target not found.", body = ErrorBody),
        (status = 409, description = "Target is already a core-admin.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn promote_core_admin(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    access
        .promote_core_admin(caller.as_deref(), request.validate()?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/users/get",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Account profile.", body = UserProfile),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
        (status = 404, description = "Account not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, Error> {
    let request = json_body(payload)?;
    let user = access
        .get_user_by_id(caller.as_deref(), request.validate()?)
        .await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/v1/users/search",
    request_body = SearchUsersRequest,
    responses(
        (status = 200, description = "Accounts whose email starts with the prefix.", body = UsersResponse),
        (status = 403, description = "Caller is not an admin.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn search_users(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<SearchUsersRequest>, JsonRejection>,
) -> Result<Json<UsersResponse>, Error> {
    let request = json_body(payload)?;
    let users = access
        .get_users_by_email(caller.as_deref(), &request.email_prefix)
        .await?;
    Ok(Json(UsersResponse { users }))
}

#[utoipa::path(
    post,
    path = "/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed."),
        (status = 400, description = "Invalid input.", body = ErrorBody),
        (status = 401, description = "Missing or invalid access assertion.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn change_password(
    access: Extension<Arc<AccessService>>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let request = json_body(payload)?;
    request.validate()?;

    access
        .change_password(caller.as_deref(), SecretString::from(request.new_password))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
