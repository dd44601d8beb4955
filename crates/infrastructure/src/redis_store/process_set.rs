use alive_core::{AliveResult, ProcessInfo, ProcessRegistry, SCAN_ORIGIN};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::store_error;

/// Set of live process identities maintained by Sidekiq.
pub const PROCESSES_KEY: &str = "processes";

/// Subset of the `info` JSON each Sidekiq process publishes.
#[derive(Debug, Deserialize)]
struct ProcessInfoPayload {
    hostname: String,
    #[serde(default)]
    pid: u32,
    #[serde(default)]
    concurrency: u64,
    #[serde(default)]
    queues: Vec<String>,
}

/// Reads Sidekiq's process registry: the `processes` set plus one hash per
/// identity with `info`, `busy` and `beat` fields. Identities whose hash has
/// expired are dead and skipped.
#[derive(Clone)]
pub struct RedisProcessSet {
    conn: ConnectionManager,
}

impl RedisProcessSet {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn identities(&self) -> AliveResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor = SCAN_ORIGIN;
        let mut identities = Vec::new();
        loop {
            let (next, page): (u64, Vec<String>) = redis::cmd("SSCAN")
                .arg(PROCESSES_KEY)
                .arg(cursor)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_error("SSCAN", e))?;
            identities.extend(page);
            cursor = next;
            if cursor == SCAN_ORIGIN {
                break;
            }
        }
        identities.sort();
        identities.dedup();
        Ok(identities)
    }
}

#[async_trait]
impl ProcessRegistry for RedisProcessSet {
    #[instrument(skip(self))]
    async fn processes(&self) -> AliveResult<Vec<ProcessInfo>> {
        let identities = self.identities().await?;
        if identities.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for identity in &identities {
            pipe.cmd("HMGET")
                .arg(identity)
                .arg("info")
                .arg("busy")
                .arg("beat");
        }
        let mut conn = self.conn.clone();
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("HMGET", e))?;

        let mut processes = Vec::with_capacity(rows.len());
        for (identity, (info, busy, beat)) in identities.into_iter().zip(rows) {
            let Some(info) = info else {
                debug!("Process {} has no info hash, treating as dead", identity);
                continue;
            };
            let payload: ProcessInfoPayload = match serde_json::from_str(&info) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Unreadable process info for {}: {}", identity, e);
                    continue;
                }
            };
            processes.push(ProcessInfo {
                identity,
                hostname: payload.hostname,
                pid: payload.pid,
                busy: busy.and_then(|b| b.parse().ok()).unwrap_or(0),
                concurrency: payload.concurrency,
                queues: payload.queues,
                beat: beat.and_then(|b| b.parse().ok()),
            });
        }

        Ok(processes)
    }
}
