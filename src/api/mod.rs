//! HTTP binding of the account operations.

pub mod handlers;
mod openapi;
pub mod types;

pub use openapi::openapi;

use crate::{
    access::AccessService,
    pipeline::{self, routes, PipelineState, CALLER_ADDRESS_HEADER, REQUEST_ID_HEADER},
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use handlers::{auth, email, health, keys, roles, users};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

/// Build the application router: every operation behind the pipeline, plus
/// `/health` outside of it.
pub fn router(access: Arc<AccessService>, pipeline: PipelineState) -> Router {
    let operations = Router::new()
        .route(routes::REGISTER, post(auth::register))
        .route(routes::LOGIN, post(auth::login))
        .route(routes::REFRESH, post(auth::refresh))
        .route(routes::PUBLIC_KEY, get(keys::public_key))
        .route(
            routes::REQUEST_EMAIL_CONFIRMATION,
            post(email::request_confirmation),
        )
        .route(routes::CONFIRM_EMAIL, post(email::confirm))
        .route(routes::PROMOTE_MODERATOR, post(users::promote_moderator))
        .route(routes::PROMOTE_ADMIN, post(users::promote_admin))
        .route(routes::PROMOTE_CORE_ADMIN, post(users::promote_core_admin))
        .route(routes::GET_USER, post(users::get_user))
        .route(routes::SEARCH_USERS, post(users::search_users))
        .route(routes::CHANGE_PASSWORD, post(users::change_password))
        .route(routes::IS_ADMIN, post(roles::is_admin))
        .route(routes::IS_MODERATOR, post(roles::is_moderator));

    pipeline::apply(operations, pipeline)
        .route("/health", get(health::health).options(health::health))
        .layer(Extension(access))
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, access: Arc<AccessService>, pipeline: PipelineState) -> Result<()> {
    let app = router(access, pipeline).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID_HEADER),
                |_req: &Request<Body>| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(SetRequestHeaderLayer::overriding(
                HeaderName::from_static(CALLER_ADDRESS_HEADER),
                peer_address,
            ))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Gracefully shutdown");
        }
    })
    .await?;

    Ok(())
}

// Never trust a client-supplied address; always take the TCP peer.
fn peer_address(request: &Request<Body>) -> Option<HeaderValue> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .and_then(|ConnectInfo(addr)| HeaderValue::from_str(&addr.ip().to_string()).ok())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
