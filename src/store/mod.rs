//! Credential store boundary: user records and role grants.

use crate::token::RoleFlags;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_confirmed: bool,
}

/// What login needs to authenticate a user and mint assertions.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_confirmed: bool,
    pub roles: RoleFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminGrant {
    pub is_core: bool,
}

/// Every operation distinguishes [`StoreError::NotFound`] and
/// [`StoreError::AlreadyExists`] from backend failures.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<(), StoreError>;

    async fn get_user_by_id(&self, id: &str) -> Result<UserProfile, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<UserCredentials, StoreError>;

    /// Accounts whose email starts with `prefix`, ordered by email.
    async fn get_users_by_email(&self, prefix: &str) -> Result<Vec<UserProfile>, StoreError>;

    /// Returns the moderator's id, or `NotFound` if `id` holds no moderator grant.
    async fn get_moderator(&self, id: &str) -> Result<String, StoreError>;

    /// Returns the admin grant, or `NotFound` if `id` holds none.
    async fn get_admin(&self, id: &str) -> Result<AdminGrant, StoreError>;

    async fn confirm_email(&self, id: &str) -> Result<(), StoreError>;

    async fn set_password(&self, id: &str, password_hash: &str) -> Result<(), StoreError>;

    async fn promote_moderator(&self, id: &str) -> Result<(), StoreError>;

    async fn promote_admin(&self, id: &str) -> Result<(), StoreError>;

    /// Requires an existing admin grant; `NotFound` otherwise.
    async fn promote_core_admin(&self, id: &str) -> Result<(), StoreError>;
}
