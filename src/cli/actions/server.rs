use crate::{
    access::AccessService,
    api,
    challenge::ChallengeCache,
    cli::commands::auth::CoreAdmin,
    limiter::{RateLimitPolicy, RateLimiter},
    mail::LogMailer,
    pipeline::PipelineState,
    store::MemoryStore,
    token::TokenService,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{fs, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

// Expired confirmation challenges are purged on this interval.
const CHALLENGE_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub issuer: String,
    pub signing_key_path: Option<String>,
    pub signing_key: Option<SecretString>,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub confirmation_ttl_seconds: u64,
    pub frontend_base_url: String,
    pub core_admin: Option<CoreAdmin>,
    pub rate_limit: RateLimitPolicy,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key or frontend URL is invalid, seeding the
/// core-admin fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let tokens = Arc::new(
        signer(&args)?
            .with_access_ttl(Duration::from_secs(args.access_ttl_seconds))
            .with_refresh_ttl(Duration::from_secs(args.refresh_ttl_seconds)),
    );
    info!(issuer = %tokens.issuer(), kid = %tokens.kid(), "Token service ready");

    let frontend_base_url = Url::parse(&args.frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {}", args.frontend_base_url))?;

    let confirmations = Arc::new(ChallengeCache::new(Duration::from_secs(
        args.confirmation_ttl_seconds,
    )));
    confirmations.spawn_sweeper(CHALLENGE_SWEEP_EVERY);

    let limiter = Arc::new(RateLimiter::new(args.rate_limit));
    limiter.spawn_sweeper();

    let access = Arc::new(
        AccessService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LogMailer),
            tokens.clone(),
            confirmations,
        )
        .with_frontend_base_url(frontend_base_url.as_str()),
    );

    if let Some(admin) = args.core_admin {
        let id = access
            .bootstrap_core_admin(&admin.name, &admin.email, admin.password)
            .await
            .context("Failed to seed core-admin account")?;
        info!(user_id = %id, "Core-admin account ready");
    }

    api::new(args.port, access, PipelineState::new(limiter, tokens)).await
}

fn signer(args: &Args) -> Result<TokenService> {
    if let Some(path) = &args.signing_key_path {
        let seed = fs::read_to_string(path)
            .with_context(|| format!("Failed to read signing key file: {path}"))?;
        return TokenService::from_seed_base64(args.issuer.as_str(), &seed)
            .with_context(|| format!("Invalid signing key in {path}"));
    }

    if let Some(seed) = &args.signing_key {
        return TokenService::from_seed_base64(args.issuer.as_str(), seed.expose_secret())
            .context("Invalid signing key");
    }

    warn!("No signing key configured, generating an ephemeral one");
    TokenService::ephemeral(args.issuer.as_str()).context("Failed to generate signing key")
}
