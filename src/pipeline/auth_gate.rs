use super::{routes, PipelineState};
use crate::{access::Caller, token::TokenKind, Error};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// What an operation expects in terms of bearer credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRule {
    /// Must be called anonymously.
    Forbidden,
    Optional,
    /// Exactly one valid access assertion.
    Required,
}

impl CredentialRule {
    /// Paths outside the allow-lists require a credential.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        match path {
            routes::REGISTER | routes::LOGIN => Self::Forbidden,
            routes::PUBLIC_KEY | routes::REFRESH => Self::Optional,
            _ => Self::Required,
        }
    }
}

pub(super) async fn authenticate(
    State(state): State<PipelineState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_caller(&state, request.uri().path(), request.headers()) {
        Ok(Some(caller)) => {
            request.extensions_mut().insert(caller);
        }
        Ok(None) => {}
        Err(err) => return err.into_response(),
    }
    next.run(request).await
}

fn resolve_caller(
    state: &PipelineState,
    path: &str,
    headers: &HeaderMap,
) -> Result<Option<Caller>, Error> {
    let presented = headers.get_all(AUTHORIZATION).iter().count();

    match CredentialRule::for_path(path) {
        CredentialRule::Forbidden if presented > 0 => Err(Error::FailedPrecondition(
            "this operation must be called without a bearer credential".to_string(),
        )),
        CredentialRule::Forbidden | CredentialRule::Optional => Ok(None),
        CredentialRule::Required => {
            let token = single_bearer(headers)?;
            let assertion = state.tokens.verify_kind(token, TokenKind::Access)?;
            debug!(subject = %assertion.subject_id(), "Caller authenticated");
            Ok(Some(Caller::new(assertion.identity.subject_id)))
        }
    }
}

fn single_bearer(headers: &HeaderMap) -> Result<&str, Error> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        return Err(Error::Unauthenticated(
            "exactly one bearer credential is required".to_string(),
        ));
    };

    let value = value
        .to_str()
        .map_err(|_| Error::Unauthenticated("malformed authorization header".to_string()))?
        .trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };

    if token.is_empty() {
        return Err(Error::Unauthenticated(
            "empty bearer credential".to_string(),
        ));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn allow_lists() {
        assert_eq!(
            CredentialRule::for_path(routes::REGISTER),
            CredentialRule::Forbidden
        );
        assert_eq!(
            CredentialRule::for_path(routes::LOGIN),
            CredentialRule::Forbidden
        );
        assert_eq!(
            CredentialRule::for_path(routes::PUBLIC_KEY),
            CredentialRule::Optional
        );
        assert_eq!(
            CredentialRule::for_path(routes::REFRESH),
            CredentialRule::Optional
        );
        for path in [
            routes::REQUEST_EMAIL_CONFIRMATION,
            routes::CONFIRM_EMAIL,
            routes::PROMOTE_MODERATOR,
            routes::PROMOTE_ADMIN,
            routes::PROMOTE_CORE_ADMIN,
            routes::GET_USER,
            routes::SEARCH_USERS,
            routes::CHANGE_PASSWORD,
            routes::IS_ADMIN,
            routes::IS_MODERATOR,
            "/v1/auth/register/",
        ] {
            assert_eq!(CredentialRule::for_path(path), CredentialRule::Required, "{path}");
        }
    }

    #[test]
    fn bearer_prefix_is_optional() -> Result<(), Error> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(single_bearer(&headers)?, "abc");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(single_bearer(&headers)?, "abc");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(single_bearer(&headers).is_err());
        Ok(())
    }
}
