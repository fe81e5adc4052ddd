//! Ordered request pipeline wrapped around every routed operation.
//!
//! Outermost to innermost: panic recovery, admission (rate limit by caller
//! address), timing, then the authentication gate. Each stage may answer the
//! request itself instead of calling the next one.

mod admission;
mod auth_gate;
mod recovery;
mod timing;

pub use auth_gate::CredentialRule;

use crate::{limiter::RateLimiter, token::TokenService};
use axum::{middleware, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

/// Header the transport binding fills with the peer address.
pub const CALLER_ADDRESS_HEADER: &str = "x-caller-address";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fixed operation paths.
pub mod routes {
    pub const REGISTER: &str = "/v1/auth/register";
    pub const LOGIN: &str = "/v1/auth/login";
    pub const REFRESH: &str = "/v1/auth/refresh";
    pub const PUBLIC_KEY: &str = "/v1/keys/public";
    pub const REQUEST_EMAIL_CONFIRMATION: &str = "/v1/email/request-confirmation";
    pub const CONFIRM_EMAIL: &str = "/v1/email/confirm";
    pub const PROMOTE_MODERATOR: &str = "/v1/users/promote-moderator";
    pub const PROMOTE_ADMIN: &str = "/v1/users/promote-admin";
    pub const PROMOTE_CORE_ADMIN: &str = "/v1/users/promote-core-admin";
    pub const GET_USER: &str = "/v1/users/get";
    pub const SEARCH_USERS: &str = "/v1/users/search";
    pub const CHANGE_PASSWORD: &str = "/v1/users/change-password";
    pub const IS_ADMIN: &str = "/v1/roles/is-admin";
    pub const IS_MODERATOR: &str = "/v1/roles/is-moderator";
}

#[derive(Clone, Debug)]
pub struct PipelineState {
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenService>,
}

impl PipelineState {
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>, tokens: Arc<TokenService>) -> Self {
        Self { limiter, tokens }
    }
}

/// Wrap every route of `router` in the pipeline stages.
pub fn apply(router: Router, state: PipelineState) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(recovery::handle_panic))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                admission::admit,
            ))
            .layer(middleware::from_fn(timing::time_call))
            .layer(middleware::from_fn_with_state(
                state,
                auth_gate::authenticate,
            )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access::Caller,
        error::ErrorBody,
        limiter::RateLimitPolicy,
        token::{Identity, RoleFlags},
    };
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Request, StatusCode},
        response::Response,
        routing::{get, post},
        Extension,
    };
    use ed25519_dalek::SigningKey;
    use tower::ServiceExt;

    struct Fixture {
        app: Router,
        tokens: Arc<TokenService>,
    }

    fn fixture(policy: RateLimitPolicy) -> anyhow::Result<Fixture> {
        let tokens = Arc::new(TokenService::new(
            "custodian-test",
            SigningKey::from_bytes(&[7u8; 32]),
        )?);
        let state = PipelineState::new(Arc::new(RateLimiter::new(policy)), tokens.clone());

        let router = Router::new()
            .route(routes::REGISTER, post(|| async { "registered" }))
            .route(routes::REFRESH, post(|| async { "refreshed" }))
            .route(
                routes::PUBLIC_KEY,
                get(|| async {
                    if true {
                        panic!("handler exploded");
                    }
                    "unreachable"
                }),
            )
            .route(
                routes::GET_USER,
                post(|caller: Option<Extension<Caller>>| async move {
                    caller.map_or_else(|| "anonymous".to_string(), |Extension(c)| c.subject_id)
                }),
            );

        Ok(Fixture {
            app: apply(router, state),
            tokens,
        })
    }

    fn call(path: &str, address: Option<&str>, bearer: &[&str]) -> anyhow::Result<Request<Body>> {
        let method = if path == routes::PUBLIC_KEY { "GET" } else { "POST" };
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(address) = address {
            builder = builder.header(CALLER_ADDRESS_HEADER, address);
        }
        for token in bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(builder.body(Body::empty())?)
    }

    async fn body_string(response: Response) -> anyhow::Result<String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    async fn error_kind(response: Response) -> anyhow::Result<String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        Ok(body.error)
    }

    fn access_token(tokens: &TokenService, id: &str) -> anyhow::Result<String> {
        Ok(tokens.issue_access(&Identity::new(id, "alice", RoleFlags::default()))?)
    }

    #[tokio::test]
    async fn missing_caller_address_fails_closed() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;
        let response = f.app.oneshot(call(routes::REGISTER, None, &[])?).await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_kind(response).await?, "internal");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fifth_immediate_call_is_throttled() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;

        for _ in 0..4 {
            let response = f
                .app
                .clone()
                .oneshot(call(routes::REGISTER, Some("198.51.100.1"), &[])?)
                .await?;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = f
            .app
            .clone()
            .oneshot(call(routes::REGISTER, Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Another address still has its own burst.
        let response = f
            .app
            .clone()
            .oneshot(call(routes::REGISTER, Some("198.51.100.2"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn throttling_runs_before_authentication() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default().with_burst(0))?;
        let response = f
            .app
            .oneshot(call(routes::GET_USER, Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }

    #[tokio::test]
    async fn credential_on_forbidden_endpoint_is_precondition_failure() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;
        let token = access_token(&f.tokens, "user-1")?;
        let response = f
            .app
            .oneshot(call(routes::REGISTER, Some("198.51.100.1"), &[token.as_str()])?)
            .await?;
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        Ok(())
    }

    #[tokio::test]
    async fn optional_endpoint_accepts_either() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;
        let token = access_token(&f.tokens, "user-1")?;

        let response = f
            .app
            .clone()
            .oneshot(call(routes::REFRESH, Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = f
            .app
            .oneshot(call(routes::REFRESH, Some("198.51.100.1"), &[token.as_str()])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn protected_endpoint_injects_verified_caller() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;
        let token = access_token(&f.tokens, "user-42")?;
        let response = f
            .app
            .oneshot(call(routes::GET_USER, Some("198.51.100.1"), &[token.as_str()])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await?, "user-42");
        Ok(())
    }

    #[tokio::test]
    async fn protected_endpoint_rejects_bad_credentials() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default().with_burst(16))?;
        let token = access_token(&f.tokens, "user-1")?;
        let refresh = f
            .tokens
            .issue_refresh(&Identity::new("user-1", "alice", RoleFlags::default()))?;

        let cases: Vec<Vec<&str>> = vec![
            vec![],
            vec![token.as_str(), token.as_str()],
            vec!["v4.public.garbage"],
            vec![refresh.as_str()],
        ];

        for bearer in cases {
            let response = f
                .app
                .clone()
                .oneshot(call(routes::GET_USER, Some("198.51.100.1"), &bearer)?)
                .await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{bearer:?}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_paths_require_credentials() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;
        let response = f
            .app
            .clone()
            .oneshot(call("/v1/unknown", Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = access_token(&f.tokens, "user-1")?;
        let response = f
            .app
            .oneshot(call("/v1/unknown", Some("198.51.100.1"), &[token.as_str()])?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn panics_become_internal_errors_and_serving_continues() -> anyhow::Result<()> {
        let f = fixture(RateLimitPolicy::default())?;

        let response = f
            .app
            .clone()
            .oneshot(call(routes::PUBLIC_KEY, Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_kind(response).await?, "internal");

        let response = f
            .app
            .oneshot(call(routes::REFRESH, Some("198.51.100.1"), &[])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
