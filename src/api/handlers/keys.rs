use crate::{access::AccessService, token::PaserkKeySet};
use axum::{response::IntoResponse, Extension, Json};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/keys/public",
    responses(
        (status = 200, description = "PASERK keyset for verifying issued assertions.", body = PaserkKeySet),
    ),
    tag = "keys"
)]
pub async fn public_key(access: Extension<Arc<AccessService>>) -> impl IntoResponse {
    Json(access.public_key())
}
