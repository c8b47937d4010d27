//! Per-client token buckets for the public write endpoints.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

/// Buckets idle this long are full again and can be forgotten.
const IDLE_EVICTION: Duration = Duration::from_secs(60 * 60);

/// Number of tracked clients above which idle buckets are evicted.
const EVICTION_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter keyed by hashed client IP.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter from configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            capacity: config.capacity,
            refill_per_sec: config.refill_per_minute / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take a token for `key`. Returns `false` when the bucket is empty.
    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut buckets = self.buckets.lock().await;
        if buckets.len() > EVICTION_THRESHOLD {
            buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < IDLE_EVICTION);
        }

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
