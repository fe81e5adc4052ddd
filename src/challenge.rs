//! Single-use, TTL-bounded confirmation challenges, at most one per user.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::debug;

pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("a challenge is already outstanding for this user")]
    AlreadyOutstanding,
}

struct Challenge {
    token: String,
    created_at: Instant,
}

impl Challenge {
    fn is_live(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created_at) < ttl
    }
}

/// Owns every outstanding challenge. Callers only ever see the token string.
pub struct ChallengeCache {
    ttl: Duration,
    records: Mutex<HashMap<String, Challenge>>,
}

impl ChallengeCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Start a challenge for `user_id` and return its token.
    ///
    /// # Errors
    ///
    /// Returns [`ChallengeError::AlreadyOutstanding`] if a live challenge
    /// exists; the existing one is left untouched.
    pub async fn begin_challenge(&self, user_id: &str) -> Result<String, ChallengeError> {
        let now = Instant::now();
        let mut records = self.records.lock().await;

        if records
            .get(user_id)
            .is_some_and(|challenge| challenge.is_live(self.ttl, now))
        {
            return Err(ChallengeError::AlreadyOutstanding);
        }

        let token = generate_token();
        records.insert(
            user_id.to_string(),
            Challenge {
                token: token.clone(),
                created_at: now,
            },
        );
        drop(records);

        debug!(user_id, "Challenge started");
        Ok(token)
    }

    /// Return the live token for `user_id` without consuming it.
    pub async fn peek(&self, user_id: &str) -> Option<String> {
        let now = Instant::now();
        let records = self.records.lock().await;
        records
            .get(user_id)
            .filter(|challenge| challenge.is_live(self.ttl, now))
            .map(|challenge| challenge.token.clone())
    }

    /// Consume the challenge iff it is live and `presented` matches.
    ///
    /// A mismatch leaves the record in place.
    pub async fn verify_and_consume(&self, user_id: &str, presented: &str) -> bool {
        let now = Instant::now();
        let mut records = self.records.lock().await;

        let Some(challenge) = records.get(user_id) else {
            return false;
        };
        if !challenge.is_live(self.ttl, now) {
            records.remove(user_id);
            return false;
        }
        if !tokens_match(&challenge.token, presented) {
            return false;
        }

        records.remove(user_id);
        true
    }

    /// Drop an outstanding challenge, e.g. when its message could not be sent.
    pub async fn withdraw(&self, user_id: &str) -> bool {
        self.records.lock().await.remove(user_id).is_some()
    }

    /// Remove expired records and return how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, challenge| challenge.is_live(self.ttl, now));
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Periodically purge expired records until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                sleep(every).await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "Purged expired challenges");
                }
            }
        })
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

// Fixed-length digests keep the comparison independent of the presented length.
fn tokens_match(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    expected
        .iter()
        .zip(presented.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
