use crate::access::DEFAULT_FRONTEND_BASE_URL;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ISSUER: &str = "issuer";
pub const ARG_SIGNING_KEY_PATH: &str = "signing-key-path";
pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ACCESS_TTL: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL: &str = "refresh-ttl-seconds";
pub const ARG_CONFIRMATION_TTL: &str = "confirmation-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_CORE_ADMIN_EMAIL: &str = "core-admin-email";
pub const ARG_CORE_ADMIN_PASSWORD: &str = "core-admin-password";
pub const ARG_CORE_ADMIN_NAME: &str = "core-admin-name";

#[derive(Debug)]
pub struct Options {
    pub issuer: String,
    pub signing_key_path: Option<String>,
    pub signing_key: Option<SecretString>,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub confirmation_ttl_seconds: u64,
    pub frontend_base_url: String,
    pub core_admin: Option<CoreAdmin>,
}

/// Account seeded with every tier at startup.
#[derive(Debug)]
pub struct CoreAdmin {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

impl Options {
    /// Parse token, confirmation and bootstrap options.
    ///
    /// # Errors
    /// Returns an error if a value is missing or inconsistent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let core_admin = match matches.get_one::<String>(ARG_CORE_ADMIN_EMAIL) {
            Some(email) => Some(CoreAdmin {
                name: matches
                    .get_one::<String>(ARG_CORE_ADMIN_NAME)
                    .cloned()
                    .context("missing required argument: --core-admin-name")?,
                email: email.clone(),
                password: matches
                    .get_one::<String>(ARG_CORE_ADMIN_PASSWORD)
                    .cloned()
                    .map(SecretString::from)
                    .context("missing required argument: --core-admin-password")?,
            }),
            None => None,
        };

        Ok(Self {
            issuer: matches
                .get_one::<String>(ARG_ISSUER)
                .cloned()
                .context("missing required argument: --issuer")?,
            signing_key_path: matches.get_one::<String>(ARG_SIGNING_KEY_PATH).cloned(),
            signing_key: matches
                .get_one::<String>(ARG_SIGNING_KEY)
                .cloned()
                .map(SecretString::from),
            access_ttl_seconds: seconds(matches, ARG_ACCESS_TTL)?,
            refresh_ttl_seconds: seconds(matches, ARG_REFRESH_TTL)?,
            confirmation_ttl_seconds: seconds(matches, ARG_CONFIRMATION_TTL)?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            core_admin,
        })
    }
}

fn seconds(matches: &ArgMatches, id: &str) -> Result<u64> {
    matches
        .get_one::<u64>(id)
        .copied()
        .with_context(|| format!("missing required argument: --{id}"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_confirmation_args(command);
    with_bootstrap_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long("issuer")
                .help("Issuer embedded in and required of every assertion")
                .env("CUSTODIAN_ISSUER")
                .default_value("custodian"),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY_PATH)
                .long("signing-key-path")
                .help("File holding the base64 Ed25519 signing seed")
                .env("CUSTODIAN_SIGNING_KEY_PATH")
                .conflicts_with(ARG_SIGNING_KEY),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long("signing-key")
                .help("Base64 Ed25519 signing seed")
                .long_help(
                    "Base64 Ed25519 signing seed. Without this or --signing-key-path an ephemeral key is generated and assertions do not survive a restart.",
                )
                .env("CUSTODIAN_SIGNING_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL)
                .long("access-ttl-seconds")
                .help("Access assertion lifetime in seconds")
                .env("CUSTODIAN_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL)
                .long("refresh-ttl-seconds")
                .help("Refresh assertion lifetime in seconds")
                .env("CUSTODIAN_REFRESH_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_confirmation_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CONFIRMATION_TTL)
                .long("confirmation-ttl-seconds")
                .help("Email confirmation challenge TTL in seconds")
                .env("CUSTODIAN_CONFIRMATION_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long("frontend-base-url")
                .help("Frontend base URL used for confirmation links")
                .env("CUSTODIAN_FRONTEND_BASE_URL")
                .default_value(DEFAULT_FRONTEND_BASE_URL),
        )
}

fn with_bootstrap_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CORE_ADMIN_EMAIL)
                .long("core-admin-email")
                .help("Seed a core-admin account with this email at startup")
                .env("CUSTODIAN_CORE_ADMIN_EMAIL")
                .requires_all([ARG_CORE_ADMIN_PASSWORD, ARG_CORE_ADMIN_NAME]),
        )
        .arg(
            Arg::new(ARG_CORE_ADMIN_PASSWORD)
                .long("core-admin-password")
                .help("Password of the seeded core-admin")
                .env("CUSTODIAN_CORE_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_CORE_ADMIN_NAME)
                .long("core-admin-name")
                .help("Display name of the seeded core-admin")
                .env("CUSTODIAN_CORE_ADMIN_NAME"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn cleared<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("CUSTODIAN_SIGNING_KEY", None::<&str>),
                ("CUSTODIAN_SIGNING_KEY_PATH", None::<&str>),
                ("CUSTODIAN_CORE_ADMIN_EMAIL", None::<&str>),
                ("CUSTODIAN_CORE_ADMIN_PASSWORD", None::<&str>),
                ("CUSTODIAN_CORE_ADMIN_NAME", None::<&str>),
                ("CUSTODIAN_ACCESS_TTL_SECONDS", None::<&str>),
            ],
            f,
        )
    }

    #[test]
    fn defaults() -> Result<()> {
        cleared(|| {
            let matches = with_args(Command::new("t")).try_get_matches_from(vec!["t"])?;
            let options = Options::parse(&matches)?;
            assert_eq!(options.issuer, "custodian");
            assert_eq!(options.access_ttl_seconds, 900);
            assert_eq!(options.refresh_ttl_seconds, 86_400);
            assert_eq!(options.confirmation_ttl_seconds, 1800);
            assert_eq!(options.frontend_base_url, DEFAULT_FRONTEND_BASE_URL);
            assert!(options.signing_key.is_none());
            assert!(options.core_admin.is_none());
            Ok(())
        })
    }

    #[test]
    fn core_admin_needs_password_and_name() {
        cleared(|| {
            let result = with_args(Command::new("t")).try_get_matches_from(vec![
                "t",
                "--core-admin-email",
                "root@example.com",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn core_admin_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("CUSTODIAN_CORE_ADMIN_EMAIL", Some("root@example.com")),
                ("CUSTODIAN_CORE_ADMIN_PASSWORD", Some("correct horse")),
                ("CUSTODIAN_CORE_ADMIN_NAME", Some("root")),
            ],
            || {
                let matches = with_args(Command::new("t")).try_get_matches_from(vec!["t"])?;
                let options = Options::parse(&matches)?;
                let admin = options.core_admin.context("core admin")?;
                assert_eq!(admin.email, "root@example.com");
                assert_eq!(admin.name, "root");
                assert_eq!(admin.password.expose_secret(), "correct horse");
                Ok(())
            },
        )
    }

    #[test]
    fn key_sources_conflict() {
        cleared(|| {
            let result = with_args(Command::new("t")).try_get_matches_from(vec![
                "t",
                "--signing-key",
                "AAAA",
                "--signing-key-path",
                "/tmp/key",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ArgumentConflict)
            );
        });
    }

    #[test]
    fn zero_ttl_is_rejected() {
        cleared(|| {
            let result = with_args(Command::new("t")).try_get_matches_from(vec![
                "t",
                "--access-ttl-seconds",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn secrets_are_redacted() -> Result<()> {
        cleared(|| {
            let matches = with_args(Command::new("t")).try_get_matches_from(vec![
                "t",
                "--signing-key",
                "c2VjcmV0LXNlZWQ=",
            ])?;
            let options = Options::parse(&matches)?;
            assert!(!format!("{options:?}").contains("c2VjcmV0LXNlZWQ="));
            Ok(())
        })
    }
}
