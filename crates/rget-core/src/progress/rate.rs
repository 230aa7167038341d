//! Throughput ceiling as a token bucket that starts empty.
//!
//! Tokens accrue at `limit` bytes/s up to one second of burst; every received
//! block spends tokens and a negative balance is paid off by sleeping. Since
//! the bucket starts empty, bytes received never exceed `limit * elapsed`
//! once the pause has been served.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: Option<u64>,
    available: f64,
    max_burst: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// `limit` in bytes per second; `None` never pauses.
    pub fn new(limit: Option<u64>) -> Self {
        Self::starting_at(limit, Instant::now())
    }

    pub fn starting_at(limit: Option<u64>, now: Instant) -> Self {
        let limit = limit.filter(|l| *l > 0);
        Self {
            limit,
            available: 0.0,
            max_burst: limit.unwrap_or(0) as f64,
            last_refill: now,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Account for `bytes` just received at `now`; returns how long to pause
    /// before reading again.
    pub fn consume(&mut self, bytes: u64, now: Instant) -> Duration {
        let Some(limit) = self.limit else {
            return Duration::ZERO;
        };
        let limit = limit as f64;
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.available = (self.available + elapsed * limit).min(self.max_burst);
        self.last_refill = now;

        self.available -= bytes as f64;
        if self.available >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.available / limit)
        }
    }
}
