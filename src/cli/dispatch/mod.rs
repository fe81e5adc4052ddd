//! Map validated CLI arguments to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, limits, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let auth = auth::Options::parse(matches)?;
    let rate_limit = limits::policy(matches)?;

    Ok(Action::Server(Args {
        port,
        issuer: auth.issuer,
        signing_key_path: auth.signing_key_path,
        signing_key: auth.signing_key,
        access_ttl_seconds: auth.access_ttl_seconds,
        refresh_ttl_seconds: auth.refresh_ttl_seconds,
        confirmation_ttl_seconds: auth.confirmation_ttl_seconds,
        frontend_base_url: auth.frontend_base_url,
        core_admin: auth.core_admin,
        rate_limit,
    }))
}
