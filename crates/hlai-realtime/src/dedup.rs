//! Time-windowed duplicate suppression for realtime frames.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Remembers identity keys for a fixed TTL.
///
/// Every observation prunes expired keys first, so a key seen again after
/// the window passes is treated as new.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    seen: HashMap<String, Instant>,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    /// Record `key` at `now`. Returns `false` if it was already seen within
    /// the TTL.
    pub fn observe(&mut self, key: &str, now: Instant) -> bool {
        self.prune(now);
        if self.seen.contains_key(key) {
            return false;
        }
        self.seen.insert(key.to_string(), now);
        true
    }

    /// Drop keys older than the TTL.
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) <= ttl);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_within_ttl_rejected() {
        let mut cache = DedupCache::new(Duration::from_secs(120));
        let t0 = Instant::now();
        assert!(cache.observe("lead.created:L1:ts", t0));
        assert!(!cache.observe("lead.created:L1:ts", t0 + Duration::from_secs(119)));
        assert!(cache.observe("lead.created:L2:ts", t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_key_expires_after_ttl() {
        let mut cache = DedupCache::new(Duration::from_secs(120));
        let t0 = Instant::now();
        assert!(cache.observe("k", t0));
        assert!(cache.observe("k", t0 + Duration::from_secs(121)));
    }

    #[test]
    fn test_prune_drops_only_expired() {
        let mut cache = DedupCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.observe("old", t0);
        cache.observe("new", t0 + Duration::from_secs(8));
        cache.prune(t0 + Duration::from_secs(15));
        assert_eq!(cache.len(), 1);
        assert!(!cache.observe("new", t0 + Duration::from_secs(15)));
    }
}
