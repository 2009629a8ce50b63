//! TTL-bound protocol session cache.
//!
//! Keyed `package:account`. Expired entries are discarded and rebuilt via
//! the supplied builder, never refreshed in place — a rebuild re-acquires
//! credentials and a fresh device snapshot.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vending_types::BillingResult;

/// Default lifetime of a cached protocol session.
pub const SESSION_TTL: Duration = Duration::from_secs(60);

struct SessionEntry<T> {
    session: Arc<T>,
    expires_at: Instant,
}

/// Concurrent map of live sessions with lazy rebuild.
pub struct SessionCache<T> {
    ttl: Duration,
    entries: DashMap<String, SessionEntry<T>>,
}

impl<T: Send + Sync + 'static> SessionCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: DashMap::new() }
    }

    fn key(package: &str, account: &str) -> String {
        format!("{}:{}", package, account)
    }

    /// Return a live session or build, store, and return a fresh one.
    ///
    /// Builder failures propagate and leave no entry behind, so the next
    /// call retries the build.
    pub async fn get_or_create<F, Fut>(
        &self,
        package: &str,
        account: &str,
        build: F,
    ) -> BillingResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BillingResult<T>>,
    {
        let key = Self::key(package, account);
        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > Instant::now() {
                return Ok(Arc::clone(&entry.session));
            }
        }
        self.entries.remove(&key);

        tracing::debug!("[SessionCache] Building session for {}", key);
        let session = Arc::new(build().await?);
        self.entries.insert(
            key,
            SessionEntry { session: Arc::clone(&session), expires_at: Instant::now() + self.ttl },
        );
        Ok(session)
    }

    /// Drop a cached session, forcing a rebuild on next use.
    pub fn invalidate(&self, package: &str, account: &str) {
        self.entries.remove(&Self::key(package, account));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
