use std::time::Duration;

use async_trait::async_trait;

use crate::AliveResult;

/// Cursor value that starts a scan and signals its completion.
pub const SCAN_ORIGIN: u64 = 0;

/// 带过期时间的键值存储接口
///
/// Every mutating call is atomic at the store level; callers never hold a
/// lock across these calls.
#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn get(&self, key: &str) -> AliveResult<Option<String>>;

    /// Write `value` with an expiry, replacing any previous value and TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AliveResult<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> AliveResult<bool>;

    /// One page of a cursor-based scan over keys matching a glob `pattern`.
    ///
    /// Pages may be empty, may repeat keys and come in no particular order.
    /// The scan is complete once the returned cursor is [`SCAN_ORIGIN`].
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
        -> AliveResult<(u64, Vec<String>)>;

    /// Remaining time to live; `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> AliveResult<Option<Duration>>;

    /// Atomically increment an integer counter, creating it at 0 first.
    async fn incr(&self, key: &str) -> AliveResult<i64>;
}
