//! Per-address token-bucket admission control.
//!
//! Buckets are created lazily on first sighting and evicted by a background
//! sweep once an address has been idle long enough.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    burst: u32,
    refill_per_second: f64,
    idle_after: Duration,
    sweep_every: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            burst: 4,
            refill_per_second: 2.0,
            idle_after: Duration::from_secs(3 * 60),
            sweep_every: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    #[must_use]
    pub fn with_refill_per_second(mut self, refill: f64) -> Self {
        self.refill_per_second = refill;
        self
    }

    #[must_use]
    pub const fn with_idle_after(mut self, idle: Duration) -> Self {
        self.idle_after = idle;
        self
    }

    #[must_use]
    pub const fn with_sweep_every(mut self, every: Duration) -> Self {
        self.sweep_every = every;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, policy: &RateLimitPolicy, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed
            .mul_add(policy.refill_per_second, self.tokens)
            .min(f64::from(policy.burst));
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    clients: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token from the bucket of `client_address`.
    pub async fn allow(&self, client_address: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        let bucket = clients
            .entry(client_address.to_string())
            .or_insert_with(|| Bucket::full(f64::from(self.policy.burst), now));
        bucket.last_seen = now;
        bucket.refill(&self.policy, now);

        if bucket.try_take() {
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }

    /// Drop buckets not seen within the idle threshold.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let idle_after = self.policy.idle_after;
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, bucket| now.duration_since(bucket.last_seen) <= idle_after);
        before - clients.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Run [`RateLimiter::evict_idle`] on the policy interval until the
    /// limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let every = self.policy.sweep_every;
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                sleep(every).await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted idle rate-limit clients");
                }
            }
        })
    }
}
