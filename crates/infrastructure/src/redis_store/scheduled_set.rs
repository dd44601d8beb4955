use alive_core::{AliveResult, ScheduledEntry, ScheduledJob, ScheduledJobStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument, warn};

use super::store_error;

/// Sorted set of pending heartbeats, scored by epoch seconds.
///
/// Kept apart from Sidekiq's own `schedule` set, whose poller would otherwise
/// move due heartbeats onto a `queue:*` list nothing consumes.
pub const SCHEDULE_KEY: &str = "sidekiq_alive:schedule";

const SCAN_COUNT: usize = 100;
const CLAIM_WINDOW: usize = 100;

#[derive(Clone)]
pub struct RedisScheduledSet {
    conn: ConnectionManager,
    key: String,
}

impl RedisScheduledSet {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_key(conn, SCHEDULE_KEY)
    }

    pub fn with_key(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }
}

#[async_trait]
impl ScheduledJobStore for RedisScheduledSet {
    #[instrument(skip(self, job), fields(jid = %job.jid))]
    async fn schedule(&self, job: &ScheduledJob, run_at: f64) -> AliveResult<()> {
        let member = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(&self.key)
            .arg(run_at)
            .arg(&member)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("ZADD", e))?;
        debug!("Scheduled {} on {} at {}", job.class, job.queue, run_at);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn scan(&self, cursor: u64, pattern: &str) -> AliveResult<(u64, Vec<ScheduledEntry>)> {
        let mut conn = self.conn.clone();
        let (next, flat): (u64, Vec<String>) = redis::cmd("ZSCAN")
            .arg(&self.key)
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("ZSCAN", e))?;

        // ZSCAN replies member, score, member, score, ...
        let mut entries = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks_exact(2) {
            let (member, score) = (&pair[0], &pair[1]);
            let job = match serde_json::from_str::<ScheduledJob>(member) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping unreadable scheduled job: {}", e);
                    continue;
                }
            };
            entries.push(ScheduledEntry {
                job,
                member: member.clone(),
                run_at: score.parse().unwrap_or_default(),
            });
        }

        Ok((next, entries))
    }

    #[instrument(skip(self, entry), fields(jid = %entry.job.jid))]
    async fn remove(&self, entry: &ScheduledEntry) -> AliveResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("ZREM")
            .arg(&self.key)
            .arg(&entry.member)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("ZREM", e))?;
        Ok(removed == 1)
    }

    #[instrument(skip(self))]
    async fn claim_due(
        &self,
        queue: &str,
        now: f64,
        limit: usize,
    ) -> AliveResult<Vec<ScheduledJob>> {
        let mut conn = self.conn.clone();
        let mut claimed = Vec::new();
        // due members of other queues stay in the set and are stepped over
        let mut offset = 0;

        while claimed.len() < limit {
            let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(&self.key)
                .arg("-inf")
                .arg(now)
                .arg("LIMIT")
                .arg(offset)
                .arg(CLAIM_WINDOW)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_error("ZRANGEBYSCORE", e))?;
            let exhausted = due.len() < CLAIM_WINDOW;

            for member in due {
                if claimed.len() >= limit {
                    break;
                }
                let job = match serde_json::from_str::<ScheduledJob>(&member) {
                    Ok(job) if job.queue == queue => job,
                    _ => {
                        offset += 1;
                        continue;
                    }
                };
                // whoever removes the member owns the job
                let removed: i64 = redis::cmd("ZREM")
                    .arg(&self.key)
                    .arg(&member)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| store_error("ZREM", e))?;
                if removed == 1 {
                    claimed.push(job);
                }
            }

            if exhausted {
                break;
            }
        }

        Ok(claimed)
    }
}
