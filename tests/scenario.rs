use anyhow::{Context, Result};
use argon2::Params;
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use custodian::{
    access::{AccessService, Passwords},
    api::{
        self,
        types::{AccessTokenResponse, RoleCheckResponse, UsersResponse},
    },
    challenge::ChallengeCache,
    error::ErrorBody,
    limiter::{RateLimitPolicy, RateLimiter},
    mail::{MailMessage, Mailer},
    pipeline::{routes, PipelineState, CALLER_ADDRESS_HEADER},
    store::{MemoryStore, UserProfile},
    token::{PaserkKeySet, TokenService},
};
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;

const ADDRESS: &str = "203.0.113.7";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<MailMessage>>,
}

impl Outbox {
    fn last_token(&self) -> Result<String> {
        let sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        let message = sent.last().context("no message sent")?;
        let link = message
            .body
            .lines()
            .find(|line| line.contains("/confirm/"))
            .context("no confirmation link")?;
        Ok(link.trim().rsplit('/').next().unwrap_or_default().to_string())
    }
}

impl Mailer for Outbox {
    fn send(&self, message: &MailMessage) -> Result<String> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        sent.push(message.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}

struct App {
    router: Router,
    outbox: Arc<Outbox>,
    root_id: String,
}

async fn app() -> Result<App> {
    let tokens = Arc::new(TokenService::new(
        "custodian-scenario",
        SigningKey::from_bytes(&[11u8; 32]),
    )?);
    let outbox = Arc::new(Outbox::default());
    let passwords = Passwords::with_params(Params::new(
        Params::MIN_M_COST,
        Params::MIN_T_COST,
        1,
        None,
    )?);

    let access = Arc::new(
        AccessService::new(
            Arc::new(MemoryStore::new()),
            outbox.clone(),
            tokens.clone(),
            Arc::new(ChallengeCache::new(Duration::from_secs(1800))),
        )
        .with_passwords(passwords),
    );
    let root_id = access
        .bootstrap_core_admin("root", "root@example.com", "root-password".into())
        .await?;

    let limiter = Arc::new(RateLimiter::new(
        RateLimitPolicy::default().with_burst(1000),
    ));
    let router = api::router(access, PipelineState::new(limiter, tokens));

    Ok(App {
        router,
        outbox,
        root_id,
    })
}

async fn post(app: &App, path: &str, bearer: Option<&str>, body: Value) -> Result<Response> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(CALLER_ADDRESS_HEADER, ADDRESS)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(serde_json::to_vec(&body)?))?;
    Ok(app.router.clone().oneshot(request).await?)
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login(app: &App, email: &str, password: &str) -> Result<Value> {
    let response = post(
        app,
        routes::LOGIN,
        None,
        json!({ "email": email, "password": password }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    read(response).await
}

fn field(value: &Value, name: &str) -> Result<String> {
    value[name]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("missing {name}"))
}

#[tokio::test]
async fn register_confirm_and_duplicate_request() -> Result<()> {
    let app = app().await?;

    let response = post(
        &app,
        routes::REGISTER,
        None,
        json!({ "name": "alice", "email": "Alice@Example.com", "password": "alice-password" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session: Value = read(response).await?;
    let user_id = field(&session, "user_id")?;
    let access = field(&session, "access_token")?;

    // First request sends a message, a second one while it is outstanding conflicts.
    let response = post(
        &app,
        routes::REQUEST_EMAIL_CONFIRMATION,
        Some(&access),
        json!({ "user_id": user_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(
        &app,
        routes::REQUEST_EMAIL_CONFIRMATION,
        Some(&access),
        json!({ "user_id": user_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorBody = read(response).await?;
    assert_eq!(body.error, "conflict");

    let token = app.outbox.last_token()?;

    let response = post(
        &app,
        routes::CONFIRM_EMAIL,
        Some(&access),
        json!({ "user_id": user_id, "token": "wrong" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = post(
        &app,
        routes::CONFIRM_EMAIL,
        Some(&access),
        json!({ "user_id": user_id, "token": token }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Single use.
    let response = post(
        &app,
        routes::CONFIRM_EMAIL,
        Some(&access),
        json!({ "user_id": user_id, "token": token }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = post(&app, routes::GET_USER, Some(&access), json!({ "user_id": user_id })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: UserProfile = read(response).await?;
    assert_eq!(profile.email, "alice@example.com");
    assert!(profile.email_confirmed);

    // Already confirmed.
    let response = post(
        &app,
        routes::REQUEST_EMAIL_CONFIRMATION,
        Some(&access),
        json!({ "user_id": user_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let app = app().await?;
    let body = json!({ "name": "bob", "email": "bob@example.com", "password": "bob-password" });

    let response = post(&app, routes::REGISTER, None, body.clone()).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post(&app, routes::REGISTER, None, body).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_invalid_input() -> Result<()> {
    let app = app().await?;
    let response = post(&app, routes::LOGIN, None, json!({ "email": 7 })).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = read(response).await?;
    assert_eq!(body.error, "invalid_input");
    Ok(())
}

#[tokio::test]
async fn refresh_exchange_and_password_change() -> Result<()> {
    let app = app().await?;
    let response = post(
        &app,
        routes::REGISTER,
        None,
        json!({ "name": "carol", "email": "carol@example.com", "password": "carol-password" }),
    )
    .await?;
    let session: Value = read(response).await?;
    let access = field(&session, "access_token")?;
    let refresh = field(&session, "refresh_token")?;

    // Access assertions cannot be exchanged.
    let response = post(&app, routes::REFRESH, None, json!({ "refresh_token": access })).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post(&app, routes::REFRESH, None, json!({ "refresh_token": refresh })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let fresh: AccessTokenResponse = read(response).await?;

    // Refresh assertions are not accepted as credentials.
    let response = post(
        &app,
        routes::CHANGE_PASSWORD,
        Some(&refresh),
        json!({ "new_password": "carol-password-2" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post(
        &app,
        routes::CHANGE_PASSWORD,
        Some(&fresh.access_token),
        json!({ "new_password": "carol-password-2" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(
        &app,
        routes::LOGIN,
        None,
        json!({ "email": "carol@example.com", "password": "carol-password" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    login(&app, "carol@example.com", "carol-password-2").await?;
    Ok(())
}

#[tokio::test]
async fn promotion_chain() -> Result<()> {
    let app = app().await?;
    let root = login(&app, "root@example.com", "root-password").await?;
    let root_access = field(&root, "access_token")?;
    assert_eq!(field(&root, "user_id")?, app.root_id);

    let response = post(
        &app,
        routes::REGISTER,
        None,
        json!({ "name": "dave", "email": "dave@example.com", "password": "dave-password" }),
    )
    .await?;
    let dave: Value = read(response).await?;
    let dave_id = field(&dave, "user_id")?;
    let dave_access = field(&dave, "access_token")?;

    let response = post(
        &app,
        routes::REGISTER,
        None,
        json!({ "name": "erin", "email": "erin@example.com", "password": "erin-password" }),
    )
    .await?;
    let erin: Value = read(response).await?;
    let erin_id = field(&erin, "user_id")?;

    // A plain user cannot promote anyone.
    let response = post(
        &app,
        routes::PROMOTE_MODERATOR,
        Some(&dave_access),
        json!({ "user_id": erin_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Core-admin makes dave an admin, which includes moderator.
    let response = post(
        &app,
        routes::PROMOTE_ADMIN,
        Some(&root_access),
        json!({ "user_id": dave_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(&app, routes::IS_ADMIN, Some(&dave_access), json!({ "user_id": dave_id })).await?;
    let check: RoleCheckResponse = read(response).await?;
    assert!(check.granted);
    let response = post(
        &app,
        routes::IS_MODERATOR,
        Some(&dave_access),
        json!({ "user_id": dave_id }),
    )
    .await?;
    let check: RoleCheckResponse = read(response).await?;
    assert!(check.granted);

    // Promoting twice conflicts.
    let response = post(
        &app,
        routes::PROMOTE_ADMIN,
        Some(&root_access),
        json!({ "user_id": dave_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Admin can grant moderator but not admin.
    let response = post(
        &app,
        routes::PROMOTE_ADMIN,
        Some(&dave_access),
        json!({ "user_id": erin_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = post(
        &app,
        routes::PROMOTE_MODERATOR,
        Some(&dave_access),
        json!({ "user_id": erin_id }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Admins can search by email prefix.
    let response = post(
        &app,
        routes::SEARCH_USERS,
        Some(&dave_access),
        json!({ "email_prefix": "ERIN" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let found: UsersResponse = read(response).await?;
    assert_eq!(found.users.len(), 1);
    assert_eq!(found.users[0].id, erin_id);

    // Unknown targets.
    let response = post(
        &app,
        routes::PROMOTE_MODERATOR,
        Some(&root_access),
        json!({ "user_id": "no-such-user" }),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = post(
        &app,
        routes::IS_ADMIN,
        Some(&root_access),
        json!({ "user_id": "no-such-user" }),
    )
    .await?;
    let check: RoleCheckResponse = read(response).await?;
    assert!(!check.granted);
    Ok(())
}

#[tokio::test]
async fn public_key_and_health_need_no_credentials() -> Result<()> {
    let app = app().await?;

    let request = Request::builder()
        .method("GET")
        .uri(routes::PUBLIC_KEY)
        .header(CALLER_ADDRESS_HEADER, ADDRESS)
        .body(Body::empty())?;
    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let keys: PaserkKeySet = read(response).await?;
    assert_eq!(keys.keys.len(), 1);

    // Health sits outside the pipeline and needs no caller address either.
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())?;
    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));
    Ok(())
}
