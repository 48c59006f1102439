//! # Per-Tool Rate Limiting
//!
//! Token buckets guarding against denial-of-wallet attacks: injected
//! instructions that induce the model to hammer expensive external tools.
//!
//! ## Design
//!
//! One bucket per tool. A bucket starts full at its per-minute limit and
//! refills continuously at `limit / 60` tokens per second, so a burst up to
//! the limit is allowed and the sustained rate converges on the limit.
//! Consumption happens at check time - a denied call still spent the
//! attempt, which is the correct accounting for wallet protection.

use std::time::Instant;

/// A continuously refilling token bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket allowing `per_minute` calls per minute, starting
    /// full.
    #[must_use]
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to take one token. Returns `false` when the bucket is empty.
    pub fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (after refill).
    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_capacity() {
        let mut bucket = TokenBucket::per_minute(3);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume(), "fourth call within the window denied");
    }

    #[test]
    fn test_available_tracks_consumption() {
        let mut bucket = TokenBucket::per_minute(10);
        let before = bucket.available();
        bucket.try_consume();
        let after = bucket.available();
        assert!(after < before);
    }

    #[test]
    fn test_empty_bucket_stays_empty_without_time() {
        let mut bucket = TokenBucket::per_minute(1);
        assert!(bucket.try_consume());
        // Immediately after, no meaningful refill has happened.
        assert!(!bucket.try_consume());
        assert!(!bucket.try_consume());
    }
}
