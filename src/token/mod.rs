//! Issuance and verification of signed identity assertions.
//!
//! Assertions are PASETO `v4.public` tokens signed with Ed25519. Only the
//! holder of the seed can mint them; anyone with the exported PASERK keyset
//! can verify them offline.

mod claims;
mod error;
mod paserk;
mod paseto;

pub use claims::{Assertion, Identity, IdentityClaims, RoleFlags, TokenFooter, TokenKind};
pub use error::Error;
pub use paserk::{PaserkKey, PaserkKeySet};

use base64ct::{Base64, Encoding};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::{fmt, time::Duration};
use time::OffsetDateTime;
use tracing::debug;
use ulid::Ulid;

pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct TokenService {
    issuer: String,
    signing_key: Option<SigningKey>,
    key: PaserkKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("kid", &self.key.kid)
            .field("can_sign", &self.signing_key.is_some())
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// # Errors
    ///
    /// Returns an error if the public half cannot be encoded as PASERK.
    pub fn new(issuer: impl Into<String>, signing_key: SigningKey) -> Result<Self, Error> {
        let key = PaserkKey::from_ed25519_public_key_bytes(&signing_key.verifying_key().to_bytes())?;
        Ok(Self {
            issuer: issuer.into(),
            signing_key: Some(signing_key),
            key,
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
        })
    }

    /// Build a signer from a standard base64 encoded 32-byte Ed25519 seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed is not valid base64 or not 32 bytes.
    pub fn from_seed_base64(issuer: impl Into<String>, seed_b64: &str) -> Result<Self, Error> {
        let raw = Base64::decode_vec(seed_b64.trim()).map_err(|_| Error::Base64)?;
        let seed: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidKeyLength)?;
        Self::new(issuer, SigningKey::from_bytes(&seed))
    }

    /// Build a signer with a freshly generated key that lives only as long as
    /// this process.
    ///
    /// # Errors
    ///
    /// Returns an error if the public half cannot be encoded as PASERK.
    pub fn ephemeral(issuer: impl Into<String>) -> Result<Self, Error> {
        Self::new(issuer, SigningKey::generate(&mut OsRng))
    }

    /// Build a service that can only verify.
    #[must_use]
    pub fn verifier(issuer: impl Into<String>, key: PaserkKey) -> Self {
        Self {
            issuer: issuer.into(),
            signing_key: None,
            key,
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
        }
    }

    #[must_use]
    pub const fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.key.kid
    }

    /// Issue a short-lived access assertion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SigningKeyUnavailable`] on a verifier-only service.
    pub fn issue_access(&self, identity: &Identity) -> Result<String, Error> {
        self.issue_at(TokenKind::Access, identity, now_unix())
    }

    /// Issue a long-lived refresh assertion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SigningKeyUnavailable`] on a verifier-only service.
    pub fn issue_refresh(&self, identity: &Identity) -> Result<String, Error> {
        self.issue_at(TokenKind::Refresh, identity, now_unix())
    }

    /// # Errors
    ///
    /// Returns an error if no signing key is loaded or encoding fails.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        identity: &Identity,
        now_unix_seconds: i64,
    ) -> Result<String, Error> {
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or(Error::SigningKeyUnavailable)?;

        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let ttl = i64::try_from(ttl.as_secs()).map_err(|_| Error::TimeFormat)?;

        let claims = IdentityClaims {
            iss: self.issuer.clone(),
            sub: identity.subject_id.clone(),
            name: identity.name.clone(),
            is_moderator: identity.roles.is_moderator,
            is_admin: identity.roles.is_admin,
            is_core_admin: identity.roles.is_core_admin,
            kind,
            iat: paseto::rfc3339_from_unix(now_unix_seconds)?,
            exp: paseto::rfc3339_from_unix(now_unix_seconds.saturating_add(ttl))?,
            jti: Ulid::new().to_string(),
        };
        let footer = TokenFooter {
            kid: self.key.kid.clone(),
        };

        let input = paseto::encode_signing_input(&claims, &footer).map_err(|_| Error::Signing)?;
        let signature = signing_key.sign(input.pre_auth.as_slice());

        debug!(subject = %identity.subject_id, kind = ?kind, "Issued assertion");

        Ok(paseto::build_token(
            &input.payload,
            &input.footer,
            &signature.to_bytes(),
        ))
    }

    /// Verify a presented token against the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, forged, expired or lacks a
    /// subject or display name.
    pub fn verify(&self, token: &str) -> Result<Assertion, Error> {
        self.verify_at(token, now_unix())
    }

    /// # Errors
    ///
    /// Same as [`TokenService::verify`].
    pub fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<Assertion, Error> {
        let claims = paseto::verify_v4_public(token, &self.key, &self.issuer, now_unix_seconds)?;
        let issued_at = paseto::unix_from_rfc3339(&claims.iat)?;
        let expires_at = paseto::unix_from_rfc3339(&claims.exp)?;

        Ok(Assertion {
            identity: Identity {
                subject_id: claims.sub,
                name: claims.name,
                roles: RoleFlags {
                    is_moderator: claims.is_moderator,
                    is_admin: claims.is_admin,
                    is_core_admin: claims.is_core_admin,
                },
            },
            kind: claims.kind,
            issuer: claims.iss,
            issued_at,
            expires_at,
            jti: claims.jti,
        })
    }

    /// Verify a token and require it to be of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongKind`] when the assertion verifies but is of the
    /// other kind.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Assertion, Error> {
        let assertion = self.verify(token)?;
        if assertion.kind != kind {
            return Err(Error::WrongKind);
        }
        Ok(assertion)
    }

    /// Public verification key as a PASERK keyset.
    #[must_use]
    pub fn export_public_key(&self) -> PaserkKeySet {
        PaserkKeySet::single(self.key.clone())
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
