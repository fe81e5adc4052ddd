use super::Error;
use pasetors::errors::Error as PasetorsError;
use pasetors::keys::AsymmetricPublicKey;
use pasetors::paserk::{FormatAsPaserk, Id};
use pasetors::version4::V4;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const KEYSET_VERSION: &str = "v4";
const KEYSET_PURPOSE: &str = "public";

/// Public verification keys published for downstream verifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PaserkKeySet {
    pub version: String,
    pub purpose: String,
    pub active_kid: String,
    pub keys: Vec<PaserkKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PaserkKey {
    pub kid: String,
    pub paserk: String,
}

impl PaserkKeySet {
    #[must_use]
    pub fn single(key: PaserkKey) -> Self {
        Self {
            version: KEYSET_VERSION.to_string(),
            purpose: KEYSET_PURPOSE.to_string(),
            active_kid: key.kid.clone(),
            keys: vec![key],
        }
    }

    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&PaserkKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Validate keyset metadata and ensure every `kid` matches its PASERK ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the version/purpose are invalid or any key is malformed.
    pub fn validate(&self) -> Result<(), Error> {
        if self.version != KEYSET_VERSION || self.purpose != KEYSET_PURPOSE {
            return Err(Error::UnsupportedPaserk);
        }
        if self.find_by_kid(&self.active_kid).is_none() {
            return Err(Error::UnknownKid(self.active_kid.clone()));
        }
        for key in &self.keys {
            key.validate()?;
        }
        Ok(())
    }
}

impl PaserkKey {
    /// Build a PASERK key entry from an Ed25519 public key (raw bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if PASERK ID computation fails.
    pub fn from_ed25519_public_key_bytes(public_key: &[u8; 32]) -> Result<Self, Error> {
        let key = AsymmetricPublicKey::<V4>::from(public_key.as_slice())
            .map_err(|_| Error::InvalidKeyType)?;
        let paserk = format_paserk(&key)?;
        let kid = format_kid(&key)?;
        Ok(Self { kid, paserk })
    }

    /// Convert this PASERK entry to a PASETO public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PASERK is invalid or the key bytes are malformed.
    pub fn to_public_key(&self) -> Result<AsymmetricPublicKey<V4>, Error> {
        AsymmetricPublicKey::<V4>::try_from(self.paserk.as_str())
            .map_err(|err| map_paserk_error(&err))
    }

    /// # Errors
    ///
    /// Returns an error if parsing fails or `kid` does not match the derived ID.
    pub fn validate(&self) -> Result<(), Error> {
        let key = self.to_public_key()?;
        if self.kid != format_kid(&key)? {
            return Err(Error::InvalidPaserkId);
        }
        Ok(())
    }
}

fn format_paserk(key: &AsymmetricPublicKey<V4>) -> Result<String, Error> {
    let mut paserk = String::new();
    key.fmt(&mut paserk).map_err(|_| Error::InvalidKeyType)?;
    Ok(paserk)
}

fn format_kid(key: &AsymmetricPublicKey<V4>) -> Result<String, Error> {
    let id = Id::from(key);
    let mut kid = String::new();
    id.fmt(&mut kid).map_err(|_| Error::InvalidPaserkId)?;
    Ok(kid)
}

fn map_paserk_error(err: &PasetorsError) -> Error {
    match err {
        PasetorsError::Base64 => Error::Base64,
        PasetorsError::Key => Error::InvalidKeyType,
        PasetorsError::LossyConversion => Error::InvalidLength,
        _ => Error::UnsupportedPaserk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paserk_pid_matches_reference_vector() -> Result<(), Error> {
        let key = PaserkKey {
            kid: "k4.pid.9ShR3xc8-qVJ_di0tc9nx0IDIqbatdeM2mqLFBJsKRHs".to_string(),
            paserk: "k4.public.cHFyc3R1dnd4eXp7fH1-f4CBgoOEhYaHiImKi4yNjo8".to_string(),
        };
        key.validate()
    }

    #[test]
    fn keyset_rejects_mismatched_kid() -> Result<(), Error> {
        let key = PaserkKey::from_ed25519_public_key_bytes(&[7u8; 32])?;
        let mut keyset = PaserkKeySet::single(key);
        keyset.validate()?;

        keyset.keys[0].kid = "k4.pid.invalid".to_string();
        assert!(matches!(keyset.validate(), Err(Error::UnknownKid(_))));

        keyset.active_kid = "k4.pid.invalid".to_string();
        assert!(matches!(keyset.validate(), Err(Error::InvalidPaserkId)));
        Ok(())
    }
}
