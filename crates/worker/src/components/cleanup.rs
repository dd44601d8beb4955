use alive_core::{AliveResult, ScheduledEntry, ScheduledJobStore, HEARTBEAT_JOB_CLASS, SCAN_ORIGIN};
use tracing::{debug, warn};

/// Coarse pre-filter on the raw payload; hostname matching happens afterwards.
fn heartbeat_pattern() -> String {
    format!("*{HEARTBEAT_JOB_CLASS}*")
}

/// Every scheduled heartbeat whose hostname argument is exactly `hostname`.
pub async fn pending_heartbeats(
    jobs: &dyn ScheduledJobStore,
    hostname: &str,
) -> AliveResult<Vec<ScheduledEntry>> {
    let pattern = heartbeat_pattern();
    let mut matched = Vec::new();
    let mut cursor = SCAN_ORIGIN;
    loop {
        let (next, entries) = jobs.scan(cursor, &pattern).await?;
        matched.extend(
            entries
                .into_iter()
                .filter(|entry| entry.job.is_heartbeat_for(hostname)),
        );
        cursor = next;
        if cursor == SCAN_ORIGIN {
            break;
        }
    }

    // a scan may return the same member twice
    matched.sort_by(|a, b| a.member.cmp(&b.member));
    matched.dedup_by(|a, b| a.member == b.member);
    Ok(matched)
}

/// Delete the pending heartbeats of `hostname`, leaving other instances' jobs alone.
///
/// The whole scan completes before anything is removed.
pub async fn purge_pending(jobs: &dyn ScheduledJobStore, hostname: &str) -> AliveResult<usize> {
    let pending = pending_heartbeats(jobs, hostname).await?;

    let mut purged = 0;
    for entry in &pending {
        match jobs.remove(entry).await {
            Ok(true) => purged += 1,
            // claimed by the poller in the meantime
            Ok(false) => debug!("Heartbeat {} already gone", entry.job.jid),
            Err(e) => warn!("Failed to remove heartbeat {}: {}", entry.job.jid, e),
        }
    }

    Ok(purged)
}
