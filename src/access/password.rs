use crate::Error;
use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

/// Argon2id password hashing, run on the blocking pool.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Default for Passwords {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Passwords {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if hashing fails.
    pub async fn hash(&self, password: SecretString) -> Result<String, Error> {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| anyhow!("failed to hash password: {err}"))
        })
        .await
        .map_err(Error::internal)?
        .map_err(Error::Internal)
    }

    /// Check a password against a stored PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the stored hash cannot be parsed.
    pub async fn verify(&self, password: SecretString, stored: String) -> Result<bool, Error> {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let parsed = PasswordHash::new(&stored)
                .map_err(|err| anyhow!("invalid stored password hash: {err}"))?;
            Ok(argon2
                .verify_password(password.expose_secret().as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(Error::internal)?
        .map_err(Error::Internal)
    }
}

#[cfg(test)]
pub(crate) fn cheap() -> Passwords {
    match Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None) {
        Ok(params) => Passwords::with_params(params),
        Err(_) => Passwords::new(),
    }
}
