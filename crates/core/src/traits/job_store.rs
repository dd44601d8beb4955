use async_trait::async_trait;

use crate::models::{ScheduledEntry, ScheduledJob};
use crate::AliveResult;

/// 定时任务存储接口 (the job engine's scheduled-work set)
#[async_trait]
pub trait ScheduledJobStore: Send + Sync {
    /// Enqueue `job` to run at `run_at` (epoch seconds).
    async fn schedule(&self, job: &ScheduledJob, run_at: f64) -> AliveResult<()>;

    /// One page of scheduled entries whose raw payload matches `pattern`.
    ///
    /// Same cursor protocol as [`crate::traits::TtlStore::scan`].
    async fn scan(&self, cursor: u64, pattern: &str) -> AliveResult<(u64, Vec<ScheduledEntry>)>;

    /// Returns false when the entry was already gone.
    async fn remove(&self, entry: &ScheduledEntry) -> AliveResult<bool>;

    /// Take up to `limit` jobs of `queue` due at `now`.
    ///
    /// A job is handed to exactly one caller even when several poll at once.
    async fn claim_due(
        &self,
        queue: &str,
        now: f64,
        limit: usize,
    ) -> AliveResult<Vec<ScheduledJob>>;
}
