//! Shared caching layers.
//!
//! Two caches with different shapes: a content-addressed LRU for
//! idempotent read responses, and a TTL-bound map of live protocol
//! sessions. Both are safe for concurrent use across unrelated flows.

mod response_cache;
mod session_cache;

pub use response_cache::ResponseCache;
pub use session_cache::{SessionCache, SESSION_TTL};
