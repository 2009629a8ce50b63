//! Content-addressed response cache.
//!
//! Maps the SHA-256 of exact serialized request bytes to the raw response
//! bytes. Entries carry their own TTL, checked on read independently of
//! LRU eviction: an expired entry answers as a miss even while it is still
//! resident. Eviction only happens on insert, when the capacity bound is
//! exceeded.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
    last_used: u64,
}

/// Fixed-capacity LRU keyed by request-content hash.
pub struct ResponseCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(CacheInner { entries: HashMap::new(), tick: 0 }),
        }
    }

    fn content_key(request_body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request_body);
        hex::encode(hasher.finalize())
    }

    /// Look up the cached response for a request body.
    pub fn get(&self, request_body: &[u8]) -> Option<Vec<u8>> {
        let key = Self::content_key(request_body);
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.last_used = tick;
                tracing::debug!("[ResponseCache] Hit for {}", &key[..12]);
                Some(entry.data.clone())
            }
            Some(_) => {
                // Expired entries stay resident until evicted by capacity
                tracing::debug!("[ResponseCache] Expired entry for {}", &key[..12]);
                None
            }
            None => None,
        }
    }

    /// Store a response, evicting least-recently-used entries over capacity.
    pub fn put(&self, request_body: &[u8], response_data: Vec<u8>) {
        let key = Self::content_key(request_body);
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let expires_at = Instant::now() + self.ttl;
        inner
            .entries
            .insert(key, CacheEntry { data: response_data, expires_at, last_used: tick });

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    inner.entries.remove(&k);
                    tracing::debug!("[ResponseCache] Evicted {}", &k[..12]);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get_round_trips() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        cache.put(b"request", b"response".to_vec());
        assert_eq!(cache.get(b"request"), Some(b"response".to_vec()));
        assert_eq!(cache.get(b"other"), None);
    }

    #[test]
    fn test_expired_entry_misses_but_stays_resident() {
        let cache = ResponseCache::new(16, Duration::from_millis(0));
        cache.put(b"request", b"response".to_vec());
        assert_eq!(cache.get(b"request"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_keeps_recently_used() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put(b"a", vec![1]);
        cache.put(b"b", vec![2]);
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get(b"a").is_some());
        cache.put(b"c", vec![3]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(b"a").is_some());
        assert!(cache.get(b"b").is_none());
        assert!(cache.get(b"c").is_some());
    }
}
