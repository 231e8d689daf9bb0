//! Deduplication & Rate Limiting - short-window duplicate suppression and a
//! per-service token bucket. Both structures are process-local, mutated by
//! many producer tasks concurrently, and use a single short-critical-section
//! mutex rather than anything fancier: the hot path is a hash lookup plus an
//! insert, not worth a lock-free structure at this call volume.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

const DEFAULT_WINDOW_SECS: u64 = 600;
const DEFAULT_MAX_ENTRIES: usize = 200_000;

/// `(service_id, content_hash)` dedup cache with a fixed-size eviction
/// policy. A false negative (missed duplicate) only inflates a cluster's
/// size by one and is acceptable; a false positive would silently drop a
/// distinct event and must never happen, so the content hash callers supply
/// must already cover message, level, logger, and timestamp truncated to
/// the second (see `xcluster_core::parser::short_hash` usage upstream).
pub struct DedupCache {
    window: Duration,
    max_entries: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    // insertion order for oldest-first eviction, paired with the key and
    // expiry so cleanup can run in one pass.
    entries: HashMap<(String, String), Instant>,
    order: Vec<(String, String)>,
}

impl DedupCache {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_entries: DEFAULT_MAX_ENTRIES,
            inner: Mutex::new(Inner { entries: HashMap::new(), order: Vec::new() }),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Returns true if `(service_id, content_hash)` was already seen within
    /// the window; records it either way so the next call inside the window
    /// also sees it as a duplicate (sliding-forward insertion, not a fixed
    /// bucket - this matches "seen within the last W seconds" literally).
    pub fn check_and_record(&self, service_id: &str, content_hash: &str) -> bool {
        let key = (service_id.to_string(), content_hash.to_string());
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();

        self.evict_expired_locked(&mut inner, now);

        if let Some(seen_at) = inner.entries.get(&key) {
            if now.duration_since(*seen_at) < self.window {
                return true;
            }
        }

        if inner.entries.len() >= self.max_entries {
            self.evict_oldest_locked(&mut inner);
        }

        inner.entries.insert(key.clone(), now);
        inner.order.push(key);
        false
    }

    /// Explicit eviction sweep, fired by the Scheduler's periodic cleanup job.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        self.evict_expired_locked(&mut inner, now);
    }

    fn evict_expired_locked(&self, inner: &mut Inner, now: Instant) {
        let window = self.window;
        inner.entries.retain(|_, seen_at| now.duration_since(*seen_at) < window);
        inner.order.retain(|k| inner.entries.contains_key(k));
    }

    fn evict_oldest_locked(&self, inner: &mut Inner) {
        // drop the oldest quarter of entries rather than one at a time, so
        // a burst at capacity doesn't pay eviction cost on every insert.
        let evict_count = (self.max_entries / 4).max(1);
        let to_drop: Vec<_> = inner.order.drain(..evict_count.min(inner.order.len())).collect();
        for k in to_drop {
            inner.entries.remove(&k);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

/// Build the dedup content hash for a raw log: message, level, logger, and
/// timestamp truncated to the second. Two byte-identical records within the
/// same second collapse to one entry; records a second apart do not.
pub fn dedup_hash(message: &str, level: &str, logger: Option<&str>, timestamp: DateTime<Utc>) -> String {
    xcluster_core::parser::short_hash(&format!(
        "{}|{}|{}|{}",
        message,
        level,
        logger.unwrap_or(""),
        timestamp.format("%Y-%m-%dT%H:%M:%S"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn second_identical_hash_within_window_is_duplicate() {
        let cache = DedupCache::new(600);
        assert!(!cache.check_and_record("svc", "hash-1"));
        assert!(cache.check_and_record("svc", "hash-1"));
    }

    #[test]
    fn different_services_do_not_collide() {
        let cache = DedupCache::new(600);
        assert!(!cache.check_and_record("svc-a", "hash-1"));
        assert!(!cache.check_and_record("svc-b", "hash-1"));
    }

    #[test]
    fn expired_entry_is_not_a_duplicate() {
        let cache = DedupCache::new(0);
        assert!(!cache.check_and_record("svc", "hash-1"));
        sleep(Duration::from_millis(5));
        // window of zero: the entry should already be considered expired,
        // not a false-positive duplicate.
        assert!(!cache.check_and_record("svc", "hash-1"));
    }

    #[test]
    fn dedup_hash_changes_when_timestamp_second_changes() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);
        let a = dedup_hash("boom", "ERROR", Some("l"), t1);
        let b = dedup_hash("boom", "ERROR", Some("l"), t2);
        assert_ne!(a, b);
    }

    #[test]
    fn overflow_evicts_oldest_without_panicking() {
        let cache = DedupCache::new(600).with_max_entries(8);
        for i in 0..100 {
            cache.check_and_record("svc", &format!("hash-{i}"));
        }
        assert!(cache.len() <= 8);
    }
}
