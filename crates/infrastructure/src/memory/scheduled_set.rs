use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use alive_core::{
    AliveError, AliveResult, ScheduledEntry, ScheduledJob, ScheduledJobStore, SCAN_ORIGIN,
};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use super::glob::glob_match;

const DEFAULT_SCAN_PAGE_SIZE: usize = 10;

/// Sorted-set order: score first, then member.
fn position_cmp(a: (f64, &str), b: (f64, &str)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

#[derive(Debug, Default)]
struct SortedSet {
    entries: Vec<(f64, String)>,
    /// Open scan cursors, each mapped to the last position it returned.
    cursors: HashMap<u64, (f64, String)>,
    next_cursor: u64,
}

impl SortedSet {
    fn open_cursor(&mut self, last: (f64, String)) -> u64 {
        self.next_cursor += 1;
        self.cursors.insert(self.next_cursor, last);
        self.next_cursor
    }
}

/// 内存定时任务集合, ordered by run time like a sorted set.
///
/// Scans resume after the last position returned, so members present for
/// the whole scan are seen even while others are claimed or removed.
#[derive(Debug, Clone)]
pub struct MemoryScheduledSet {
    set: Arc<Mutex<SortedSet>>,
    scan_page_size: usize,
}

impl MemoryScheduledSet {
    pub fn new() -> Self {
        Self::with_scan_page_size(DEFAULT_SCAN_PAGE_SIZE)
    }

    pub fn with_scan_page_size(scan_page_size: usize) -> Self {
        Self {
            set: Arc::new(Mutex::new(SortedSet::default())),
            scan_page_size: scan_page_size.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.set.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All scheduled jobs in run-time order.
    pub async fn jobs(&self) -> Vec<ScheduledJob> {
        let set = self.set.lock().await;
        set.entries
            .iter()
            .filter_map(|(_, member)| serde_json::from_str(member).ok())
            .collect()
    }
}

impl Default for MemoryScheduledSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduledJobStore for MemoryScheduledSet {
    async fn schedule(&self, job: &ScheduledJob, run_at: f64) -> AliveResult<()> {
        let member = serde_json::to_string(job)?;
        let mut set = self.set.lock().await;
        set.entries.retain(|(_, existing)| *existing != member);
        let position = set.entries.partition_point(|(score, existing)| {
            position_cmp((*score, existing), (run_at, &member)) == Ordering::Less
        });
        set.entries.insert(position, (run_at, member));
        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str) -> AliveResult<(u64, Vec<ScheduledEntry>)> {
        let mut set = self.set.lock().await;
        let start = if cursor == SCAN_ORIGIN {
            0
        } else {
            let (score, member) = set.cursors.remove(&cursor).ok_or_else(|| {
                AliveError::Store(format!("invalid scan cursor: {cursor}"))
            })?;
            set.entries.partition_point(|(existing_score, existing)| {
                position_cmp((*existing_score, existing), (score, &member)) != Ordering::Greater
            })
        };
        let end = (start + self.scan_page_size).min(set.entries.len());

        let mut page = Vec::new();
        for (run_at, member) in &set.entries[start..end] {
            if !glob_match(pattern, member) {
                continue;
            }
            match serde_json::from_str::<ScheduledJob>(member) {
                Ok(job) => page.push(ScheduledEntry {
                    job,
                    member: member.clone(),
                    run_at: *run_at,
                }),
                Err(e) => warn!("Skipping unreadable scheduled job: {}", e),
            }
        }

        let next = if end < set.entries.len() {
            let last = set.entries[end - 1].clone();
            set.open_cursor(last)
        } else {
            SCAN_ORIGIN
        };
        Ok((next, page))
    }

    async fn remove(&self, entry: &ScheduledEntry) -> AliveResult<bool> {
        let mut set = self.set.lock().await;
        let before = set.entries.len();
        set.entries.retain(|(_, member)| *member != entry.member);
        Ok(set.entries.len() != before)
    }

    async fn claim_due(
        &self,
        queue: &str,
        now: f64,
        limit: usize,
    ) -> AliveResult<Vec<ScheduledJob>> {
        let mut set = self.set.lock().await;
        let entries = &mut set.entries;
        let mut claimed = Vec::new();
        let mut index = 0;

        while index < entries.len() && claimed.len() < limit {
            let (run_at, member) = &entries[index];
            if *run_at > now {
                break;
            }
            match serde_json::from_str::<ScheduledJob>(member) {
                Ok(job) if job.queue == queue => {
                    entries.remove(index);
                    claimed.push(job);
                }
                _ => index += 1,
            }
        }

        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_due_respects_queue_and_time() {
        let set = MemoryScheduledSet::new();
        let mine = ScheduledJob::heartbeat("sidekiq_alive-web-1", "web-1");
        let theirs = ScheduledJob::heartbeat("sidekiq_alive-web-2", "web-2");
        let later = ScheduledJob::heartbeat("sidekiq_alive-web-1", "web-1");

        set.schedule(&mine, 10.0).await.unwrap();
        set.schedule(&theirs, 5.0).await.unwrap();
        set.schedule(&later, 50.0).await.unwrap();

        let claimed = set.claim_due("sidekiq_alive-web-1", 20.0, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].jid, mine.jid);
        assert_eq!(set.len().await, 2);

        assert!(set
            .claim_due("sidekiq_alive-web-1", 20.0, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_scan_and_remove() {
        let set = MemoryScheduledSet::with_scan_page_size(2);
        for i in 0..5 {
            let job = ScheduledJob::heartbeat("q", &format!("web-{i}"));
            set.schedule(&job, i as f64).await.unwrap();
        }
        let other = ScheduledJob::new("ReportJob", "default", vec![]);
        set.schedule(&other, 1.5).await.unwrap();

        let mut cursor = SCAN_ORIGIN;
        let mut found = Vec::new();
        loop {
            let (next, page) = set.scan(cursor, "*SidekiqAlive::Worker*").await.unwrap();
            found.extend(page);
            cursor = next;
            if cursor == SCAN_ORIGIN {
                break;
            }
        }
        assert_eq!(found.len(), 5);

        assert!(set.remove(&found[0]).await.unwrap());
        assert!(!set.remove(&found[0]).await.unwrap());
        assert_eq!(set.len().await, 5);
    }

    #[tokio::test]
    async fn test_scan_survives_claim_between_pages() {
        let set = MemoryScheduledSet::with_scan_page_size(2);
        let first = ScheduledJob::heartbeat("sidekiq_alive-web-0", "web-0");
        set.schedule(&first, 1.0).await.unwrap();
        for i in 1..4 {
            let job = ScheduledJob::heartbeat("q", &format!("web-{i}"));
            set.schedule(&job, 10.0 + i as f64).await.unwrap();
        }

        let (cursor, mut found) = set.scan(SCAN_ORIGIN, "*").await.unwrap();
        assert_ne!(cursor, SCAN_ORIGIN);
        assert_eq!(found.len(), 2);

        let claimed = set.claim_due("sidekiq_alive-web-0", 5.0, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let mut cursor = cursor;
        while cursor != SCAN_ORIGIN {
            let (next, page) = set.scan(cursor, "*").await.unwrap();
            found.extend(page);
            cursor = next;
        }
        let hostnames: Vec<String> = found.iter().map(|entry| entry.job.args[0].clone()).collect();
        assert_eq!(hostnames, vec!["web-0", "web-1", "web-2", "web-3"]);
    }
}
