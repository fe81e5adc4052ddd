use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The three independent role flags carried by every assertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleFlags {
    pub is_moderator: bool,
    pub is_admin: bool,
    pub is_core_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The subject an assertion is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub name: String,
    pub roles: RoleFlags,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, name: impl Into<String>, roles: RoleFlags) -> Self {
        Self {
            subject_id: subject_id.into(),
            name: name.into(),
            roles,
        }
    }
}

/// Wire payload of a signed assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityClaims {
    pub iss: String,
    pub sub: String,
    pub name: String,
    pub is_moderator: bool,
    pub is_admin: bool,
    pub is_core_admin: bool,
    pub kind: TokenKind,
    pub iat: String,
    pub exp: String,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenFooter {
    pub kid: String,
}

/// A verified identity assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub identity: Identity,
    pub kind: TokenKind,
    pub issuer: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub jti: String,
}

impl Assertion {
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.identity.subject_id
    }

    #[must_use]
    pub const fn roles(&self) -> RoleFlags {
        self.identity.roles
    }
}
