//! Per-service token bucket rate limiter. `allow` returns how many of a
//! requested `n` tokens were granted, which may be less than `n` when the
//! bucket partially drains mid-burst; the caller (Ingress) surfaces the
//! remainder as a rejection count rather than retrying.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

const DEFAULT_CAPACITY: u64 = 10_000;
const DEFAULT_REFILL_PER_MIN: u64 = 10_000;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: u64,
    refill_per_min: u64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowResult {
    pub accepted: u64,
    pub rejected: u64,
}

impl RateLimiter {
    pub fn new(capacity: u64, refill_per_min: u64) -> Self {
        Self { capacity, refill_per_min, buckets: Mutex::new(HashMap::new()) }
    }

    /// Attempt to admit `n` records for `service_id`. Returns the split
    /// between accepted and rejected; `accepted + rejected == n` always.
    pub fn allow(&self, service_id: &str, n: u64) -> AllowResult {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets
            .entry(service_id.to_string())
            .or_insert_with(|| Bucket { tokens: self.capacity as f64, last_refill: now });

        self.refill(bucket, now);

        let available = bucket.tokens.floor().max(0.0) as u64;
        let accepted = available.min(n);
        bucket.tokens -= accepted as f64;

        AllowResult { accepted, rejected: n - accepted }
    }

    /// Remaining tokens for a service, for the `/ingest/metrics` surface.
    pub fn remaining(&self, service_id: &str) -> u64 {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets
            .entry(service_id.to_string())
            .or_insert_with(|| Bucket { tokens: self.capacity as f64, last_refill: now });
        self.refill(bucket, now);
        bucket.tokens.floor().max(0.0) as u64
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let tokens_per_sec = self.refill_per_min as f64 / 60.0;
        bucket.tokens = (bucket.tokens + elapsed * tokens_per_sec).min(self.capacity as f64);
        bucket.last_refill = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_PER_MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_over_capacity_is_partially_rejected() {
        let limiter = RateLimiter::new(10_000, 10_000);
        // drain to 500 remaining first
        limiter.allow("svc", 9_500);
        let result = limiter.allow("svc", 2_000);
        assert_eq!(result.accepted, 500);
        assert_eq!(result.rejected, 1_500);
    }

    #[test]
    fn distinct_services_have_independent_buckets() {
        let limiter = RateLimiter::new(100, 100);
        let a = limiter.allow("svc-a", 100);
        let b = limiter.allow("svc-b", 100);
        assert_eq!(a.accepted, 100);
        assert_eq!(b.accepted, 100);
    }

    #[test]
    fn accepted_plus_rejected_equals_requested() {
        let limiter = RateLimiter::new(50, 60);
        let result = limiter.allow("svc", 200);
        assert_eq!(result.accepted + result.rejected, 200);
    }

    #[tokio::test]
    async fn refill_grants_tokens_back_over_time() {
        let limiter = RateLimiter::new(60, 60); // 1 token/sec
        let first = limiter.allow("svc", 60);
        assert_eq!(first.accepted, 60);
        assert_eq!(limiter.allow("svc", 1).accepted, 0);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let after_wait = limiter.allow("svc", 1);
        assert_eq!(after_wait.accepted, 1);
    }
}
