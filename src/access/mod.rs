//! Account operations and the role escalation rules that gate them.
//!
//! Every privileged operation takes the [`Caller`] the request pipeline
//! injected after verifying the bearer credential. A missing caller means the
//! pipeline was wired wrong and is reported as [`Error::NoIdentity`].

mod password;
mod role;

pub use password::Passwords;
pub use role::Tier;

use crate::{
    challenge::{ChallengeCache, ChallengeError},
    mail::{MailMessage, Mailer},
    store::{CredentialStore, NewUser, StoreError, UserProfile},
    token::{Identity, PaserkKeySet, RoleFlags, TokenKind, TokenService},
    Error,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";

/// Verified identity of the caller, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject_id: String,
}

impl Caller {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AccessService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    tokens: Arc<TokenService>,
    confirmations: Arc<ChallengeCache>,
    passwords: Passwords,
    frontend_base_url: String,
}

impl AccessService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        tokens: Arc<TokenService>,
        confirmations: Arc<ChallengeCache>,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            confirmations,
            passwords: Passwords::new(),
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_passwords(mut self, passwords: Passwords) -> Self {
        self.passwords = passwords;
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account and sign the new user in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: SecretString,
    ) -> Result<Session, Error> {
        let email = normalize_email(email);
        let id = Uuid::now_v7().to_string();
        let password_hash = self.passwords.hash(password).await?;

        match self
            .store
            .create_user(NewUser {
                id: id.clone(),
                name: name.to_string(),
                email,
                password_hash,
            })
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                return Err(Error::Conflict(
                    "an account with this email already exists".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        }

        let session = self.session(&Identity::new(&id, name, RoleFlags::default()))?;
        info!(user_id = %id, "User registered, email confirmation pending");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] for an unknown email or a wrong
    /// password, without saying which.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: SecretString) -> Result<Session, Error> {
        let invalid = || Error::Unauthenticated("wrong email or password".to_string());

        let user = match self.store.get_user_by_email(&normalize_email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(invalid()),
            Err(err) => return Err(err.into()),
        };

        if !self.passwords.verify(password, user.password_hash).await? {
            return Err(invalid());
        }

        info!(user_id = %user.id, "User logged in");
        self.session(&Identity::new(user.id, user.name, user.roles))
    }

    /// Exchange a refresh assertion for a fresh access assertion carrying the
    /// same identity and role flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if the token does not verify or is
    /// not a refresh assertion.
    pub fn issue_access_from_refresh(&self, refresh_token: &str) -> Result<String, Error> {
        let assertion = self
            .tokens
            .verify_kind(refresh_token, TokenKind::Refresh)?;
        Ok(self.tokens.issue_access(&assertion.identity)?)
    }

    /// Send a confirmation link to the caller's own email address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] when `user_id` is not the caller, and
    /// [`Error::Conflict`] when the email is already confirmed or a challenge
    /// is already outstanding.
    #[instrument(skip(self, caller))]
    pub async fn request_email_confirmation(
        &self,
        caller: Option<&Caller>,
        user_id: &str,
    ) -> Result<(), Error> {
        let caller = caller.ok_or(Error::NoIdentity)?;
        if caller.subject_id != user_id {
            return Err(Error::Forbidden(
                "can only request confirmation for your own account".to_string(),
            ));
        }

        let user = self.store.get_user_by_id(user_id).await?;
        if user.email_confirmed {
            return Err(Error::Conflict("email is already confirmed".to_string()));
        }

        let token = self
            .confirmations
            .begin_challenge(user_id)
            .await
            .map_err(|ChallengeError::AlreadyOutstanding| {
                Error::Conflict("a confirmation message has already been sent".to_string())
            })?;

        let link = format!("{}/confirm/{}/{}", self.frontend_base_url, user_id, token);
        let message = MailMessage::confirmation(&user.email, &user.name, &link);

        match self.mailer.send(&message) {
            Ok(message_id) => {
                info!(user_id, message_id = %message_id, "Confirmation message sent");
                Ok(())
            }
            Err(err) => {
                self.confirmations.withdraw(user_id).await;
                Err(Error::Internal(
                    err.context("failed to deliver confirmation message"),
                ))
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::FailedPrecondition`] when the token is wrong, used or
    /// expired.
    #[instrument(skip(self, token))]
    pub async fn confirm_email(&self, user_id: &str, token: &str) -> Result<(), Error> {
        if !self.confirmations.verify_and_consume(user_id, token).await {
            return Err(Error::FailedPrecondition(
                "confirmation token is invalid or expired".to_string(),
            ));
        }

        self.store.confirm_email(user_id).await?;
        info!(user_id, "Email confirmed");
        Ok(())
    }

    /// Grant moderator to `target_id`. Requires the caller to be an admin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`], [`Error::NotFound`] or [`Error::Conflict`].
    pub async fn promote_moderator(
        &self,
        caller: Option<&Caller>,
        target_id: &str,
    ) -> Result<(), Error> {
        self.promote(caller, target_id, Tier::Moderator).await
    }

    /// Grant admin (and moderator) to `target_id`. Requires a core-admin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`], [`Error::NotFound`] or [`Error::Conflict`].
    pub async fn promote_admin(&self, caller: Option<&Caller>, target_id: &str) -> Result<(), Error> {
        self.promote(caller, target_id, Tier::Admin).await
    }

    /// Grant core-admin (and every tier below) to `target_id`. Requires a
    /// core-admin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`], [`Error::NotFound`] or [`Error::Conflict`].
    pub async fn promote_core_admin(
        &self,
        caller: Option<&Caller>,
        target_id: &str,
    ) -> Result<(), Error> {
        self.promote(caller, target_id, Tier::CoreAdmin).await
    }

    #[instrument(skip(self, caller), fields(tier = tier.as_str()))]
    async fn promote(
        &self,
        caller: Option<&Caller>,
        target_id: &str,
        tier: Tier,
    ) -> Result<(), Error> {
        let caller = caller.ok_or(Error::NoIdentity)?;
        let held = self.held_tier(&caller.subject_id).await?;
        if held < tier.required_to_grant() {
            return Err(Error::forbidden());
        }

        match tier {
            Tier::User => return Ok(()),
            Tier::Moderator => {
                self.store
                    .promote_moderator(target_id)
                    .await
                    .map_err(promotion_error)?;
            }
            Tier::Admin => {
                self.store
                    .promote_admin(target_id)
                    .await
                    .map_err(promotion_error)?;
                self.grant_quietly(target_id, Tier::Moderator).await?;
            }
            Tier::CoreAdmin => {
                // The store only marks existing admins as core, so the lower
                // grants go first. They stay if the final step fails.
                self.grant_quietly(target_id, Tier::Admin).await?;
                self.grant_quietly(target_id, Tier::Moderator).await?;
                self.store
                    .promote_core_admin(target_id)
                    .await
                    .map_err(promotion_error)?;
            }
        }

        info!(caller = %caller.subject_id, target_id, "User promoted");
        Ok(())
    }

    // Grants a lower tier as part of a higher promotion; an existing grant is fine.
    async fn grant_quietly(&self, target_id: &str, tier: Tier) -> Result<(), Error> {
        let result = match tier {
            Tier::Moderator => self.store.promote_moderator(target_id).await,
            Tier::Admin => self.store.promote_admin(target_id).await,
            Tier::User | Tier::CoreAdmin => Ok(()),
        };
        match result {
            Ok(()) | Err(StoreError::AlreadyExists) => Ok(()),
            Err(err) => Err(promotion_error(err)),
        }
    }

    /// Tier the store currently records for `id`. Unknown ids are plain users.
    async fn held_tier(&self, id: &str) -> Result<Tier, Error> {
        match self.store.get_admin(id).await {
            Ok(grant) if grant.is_core => return Ok(Tier::CoreAdmin),
            Ok(_) => return Ok(Tier::Admin),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        match self.store.get_moderator(id).await {
            Ok(_) => Ok(Tier::Moderator),
            Err(StoreError::NotFound) => Ok(Tier::User),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn get_user_by_id(
        &self,
        caller: Option<&Caller>,
        user_id: &str,
    ) -> Result<UserProfile, Error> {
        caller.ok_or(Error::NoIdentity)?;
        Ok(self.store.get_user_by_id(user_id).await?)
    }

    /// Prefix search over account emails. Admins only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] for callers below admin.
    pub async fn get_users_by_email(
        &self,
        caller: Option<&Caller>,
        email_prefix: &str,
    ) -> Result<Vec<UserProfile>, Error> {
        let caller = caller.ok_or(Error::NoIdentity)?;
        if self.held_tier(&caller.subject_id).await? < Tier::Admin {
            return Err(Error::forbidden());
        }
        Ok(self
            .store
            .get_users_by_email(&normalize_email(email_prefix))
            .await?)
    }

    /// Replace the caller's own password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the caller's account no longer exists.
    #[instrument(skip(self, caller, new_password))]
    pub async fn change_password(
        &self,
        caller: Option<&Caller>,
        new_password: SecretString,
    ) -> Result<(), Error> {
        let caller = caller.ok_or(Error::NoIdentity)?;
        let hash = self.passwords.hash(new_password).await?;
        self.store.set_password(&caller.subject_id, &hash).await?;
        info!(user_id = %caller.subject_id, "Password changed");
        Ok(())
    }

    #[must_use]
    pub fn public_key(&self) -> PaserkKeySet {
        self.tokens.export_public_key()
    }

    /// # Errors
    ///
    /// Returns [`Error::Internal`] on a store failure.
    pub async fn is_admin(&self, user_id: &str) -> Result<bool, Error> {
        Ok(self.held_tier(user_id).await? >= Tier::Admin)
    }

    /// # Errors
    ///
    /// Returns [`Error::Internal`] on a store failure.
    pub async fn is_moderator(&self, user_id: &str) -> Result<bool, Error> {
        match self.store.get_moderator(user_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Create an account that already holds every tier. Used to seed the first
    /// core-admin at startup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the email is taken.
    pub async fn bootstrap_core_admin(
        &self,
        name: &str,
        email: &str,
        password: SecretString,
    ) -> Result<String, Error> {
        let session = self.register(name, email, password).await?;
        let id = session.user_id;
        self.store.promote_admin(&id).await?;
        self.store.promote_moderator(&id).await?;
        self.store.promote_core_admin(&id).await?;
        self.store.confirm_email(&id).await?;
        warn!(user_id = %id, "Seeded core-admin account");
        Ok(id)
    }

    fn session(&self, identity: &Identity) -> Result<Session, Error> {
        Ok(Session {
            user_id: identity.subject_id.clone(),
            access_token: self.tokens.issue_access(identity)?,
            refresh_token: self.tokens.issue_refresh(identity)?,
        })
    }
}

fn promotion_error(err: StoreError) -> Error {
    match err {
        StoreError::NotFound => Error::NotFound("user not found".to_string()),
        StoreError::AlreadyExists => Error::Conflict("user already holds this role".to_string()),
        StoreError::Backend(err) => Error::Internal(err),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
