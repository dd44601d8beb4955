use std::time::Duration;

use alive_core::{AliveResult, TtlStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument};

use super::store_error;

/// Redis TTL存储实现
#[derive(Clone)]
pub struct RedisTtlStore {
    conn: ConnectionManager,
}

impl RedisTtlStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> AliveResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("GET", e))
    }

    #[instrument(skip(self, value))]
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AliveResult<()> {
        let mut conn = self.conn.clone();
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("SET", e))?;
        debug!("Redis SET {} with TTL {:?}", key, ttl);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> AliveResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("DEL", e))?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> AliveResult<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("SCAN", e))
    }

    #[instrument(skip(self))]
    async fn ttl(&self, key: &str) -> AliveResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        // -2: missing, -1: no expiry
        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PTTL", e))?;
        Ok((ttl_ms >= 0).then(|| Duration::from_millis(ttl_ms as u64)))
    }

    #[instrument(skip(self))]
    async fn incr(&self, key: &str) -> AliveResult<i64> {
        let mut conn = self.conn.clone();
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("INCR", e))
    }
}
