//! Refresh budget for one database kind.
//!
//! This module provides a non-blocking token bucket that caps how many
//! downloads are attempted against the provider's quota.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Token-bucket limiter for download attempts.
///
/// # Behavior
///
/// - Starts full with `burst` tokens
/// - Refills one token every `window / burst`
/// - Never holds more than `burst` tokens
/// - A refused call has no side effects
/// - A `burst` of 0 disables limiting
pub struct RefreshLimiter {
    burst: u32,
    refill_interval: Duration,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RefreshLimiter {
    /// Creates a limiter allowing `burst` attempts per `window`.
    pub fn new(burst: u32, window: Duration) -> Self {
        let refill_interval = if burst == 0 {
            Duration::ZERO
        } else {
            window / burst
        };
        Self {
            burst,
            refill_interval,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes a token if one is available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock.
    pub fn allow_at(&self, now: Instant) -> bool {
        if self.burst == 0 {
            return true;
        }

        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refilled = elapsed.as_secs_f64() / self.refill_interval.as_secs_f64();
        bucket.tokens = (bucket.tokens + refilled).min(f64::from(self.burst));
        bucket.last_refill = bucket.last_refill.max(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time between two refilled tokens.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}
