pub mod auth;
pub mod email;
pub mod health;
pub mod keys;
pub mod roles;
pub mod users;

use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwrap a JSON body, reporting shape errors as invalid input.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::InvalidInput(rejection.body_text()))
}
