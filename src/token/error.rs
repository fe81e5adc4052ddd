use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("signing key unavailable")]
    SigningKeyUnavailable,
    #[error("failed to sign token")]
    Signing,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid footer")]
    InvalidFooter,
    #[error("missing footer")]
    MissingFooter,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported paserk prefix")]
    UnsupportedPaserk,
    #[error("invalid paserk id")]
    InvalidPaserkId,
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid key type")]
    InvalidKeyType,
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid issued-at")]
    InvalidIat,
    #[error("invalid expiration")]
    InvalidExp,
    #[error("token expired")]
    Expired,
    #[error("missing or empty claim: {0}")]
    MissingClaim(&'static str),
    #[error("unexpected token kind")]
    WrongKind,
    #[error("invalid length")]
    InvalidLength,
    #[error("time parse error")]
    TimeParse,
    #[error("time format error")]
    TimeFormat,
}

impl Error {
    /// True when the error is a rejection of a presented token rather than a
    /// local fault while producing one.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::SigningKeyUnavailable
                | Self::Signing
                | Self::TimeFormat
                | Self::InvalidKeyType
                | Self::InvalidKeyLength
        )
    }
}
