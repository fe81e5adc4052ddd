use crate::token::RoleFlags;

/// Ordered authorization tiers. The three role flags are only used at the
/// serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    User,
    Moderator,
    Admin,
    CoreAdmin,
}

impl Tier {
    /// Flags held by an account that went through the promotion chain up to
    /// this tier.
    #[must_use]
    pub const fn flags(self) -> RoleFlags {
        RoleFlags {
            is_moderator: !matches!(self, Self::User),
            is_admin: matches!(self, Self::Admin | Self::CoreAdmin),
            is_core_admin: matches!(self, Self::CoreAdmin),
        }
    }

    /// Tier a caller must hold to grant `self` to someone else.
    #[must_use]
    pub const fn required_to_grant(self) -> Self {
        match self {
            Self::User => Self::User,
            Self::Moderator => Self::Admin,
            Self::Admin | Self::CoreAdmin => Self::CoreAdmin,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::CoreAdmin => "core-admin",
        }
    }
}
