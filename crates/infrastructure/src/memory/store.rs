use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use alive_core::{AliveError, AliveResult, TtlStore, SCAN_ORIGIN};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::glob::glob_match;

const DEFAULT_SCAN_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: BTreeMap<String, Entry>,
    /// Open scan cursors, each mapped to the last key it returned.
    cursors: HashMap<u64, String>,
    next_cursor: u64,
}

impl Keyspace {
    fn open_cursor(&mut self, last_key: String) -> u64 {
        self.next_cursor += 1;
        self.cursors.insert(self.next_cursor, last_key);
        self.next_cursor
    }
}

/// 内存TTL存储实现
///
/// Scan cursors resume after the last key returned, so keys that stay live
/// for the whole scan are always returned even when others expire meanwhile.
#[derive(Debug, Clone)]
pub struct MemoryTtlStore {
    keyspace: Arc<Mutex<Keyspace>>,
    scan_page_size: usize,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self::with_scan_page_size(DEFAULT_SCAN_PAGE_SIZE)
    }

    /// Cap on keys returned per scan page, regardless of the `count` hint.
    pub fn with_scan_page_size(scan_page_size: usize) -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace::default())),
            scan_page_size: scan_page_size.max(1),
        }
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let keyspace = self.keyspace.lock().await;
        keyspace.entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn purge_expired(entries: &mut BTreeMap<String, Entry>, now: Instant) {
        entries.retain(|_, entry| entry.is_live(now));
    }
}

impl Default for MemoryTtlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn get(&self, key: &str) -> AliveResult<Option<String>> {
        let now = Instant::now();
        let keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AliveResult<()> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AliveResult<bool> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .entries
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> AliveResult<(u64, Vec<String>)> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;
        Self::purge_expired(&mut keyspace.entries, now);

        let lower = if cursor == SCAN_ORIGIN {
            Bound::Unbounded
        } else {
            match keyspace.cursors.remove(&cursor) {
                Some(last_key) => Bound::Excluded(last_key),
                None => return Err(AliveError::Store(format!("invalid scan cursor: {cursor}"))),
            }
        };

        let page_size = self.scan_page_size.min(count.max(1));
        let visited: Vec<String> = keyspace
            .entries
            .range::<String, _>((lower, Bound::Unbounded))
            .take(page_size + 1)
            .map(|(key, _)| key.clone())
            .collect();

        let more = visited.len() > page_size;
        let page_keys = &visited[..visited.len().min(page_size)];
        let page = page_keys
            .iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        let next = match page_keys.last() {
            Some(last_key) if more => keyspace.open_cursor(last_key.clone()),
            _ => SCAN_ORIGIN,
        };
        debug!("Memory SCAN {} -> {} ({})", cursor, next, pattern);
        Ok((next, page))
    }

    async fn ttl(&self, key: &str) -> AliveResult<Option<Duration>> {
        let now = Instant::now();
        let keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn incr(&self, key: &str) -> AliveResult<i64> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;

        let live = keyspace.entries.get(key).filter(|entry| entry.is_live(now));
        let (current, expires_at) = match live {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    AliveError::Store(format!(
                        "value is not an integer or out of range: {key}"
                    ))
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current + 1;
        keyspace.entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}
