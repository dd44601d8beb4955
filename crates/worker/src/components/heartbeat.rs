use std::sync::Arc;
use std::time::Duration;

use alive_core::hooks::HeartbeatCallback;
use alive_core::{
    epoch_seconds, AliveConfig, AliveResult, InstanceKeys, RecurringTask, Reschedule,
    ScheduledJob, ScheduledJobStore, TtlStore, HEARTBEAT_JOB_CLASS,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, warn};

use super::cleanup::pending_heartbeats;
use super::registry::InstanceRegistry;

/// 心跳任务
///
/// Each run writes the liveness record, refreshes the registration record and
/// asks to run again after `time_to_live / 3`. Store failures are logged and the
/// task still reschedules, so the next interval is the retry.
pub struct HeartbeatTask {
    store: Arc<dyn TtlStore>,
    registry: Arc<InstanceRegistry>,
    config: Arc<AliveConfig>,
    callback: Option<HeartbeatCallback>,
}

impl HeartbeatTask {
    pub fn new(
        store: Arc<dyn TtlStore>,
        registry: Arc<InstanceRegistry>,
        config: Arc<AliveConfig>,
        callback: Option<HeartbeatCallback>,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            callback,
        }
    }

    /// Write the liveness record for `hostname`.
    pub async fn write_liveness(&self, hostname: &str) -> AliveResult<()> {
        let key = InstanceKeys::new(&self.config, hostname).liveness();
        let now = Utc::now().timestamp().to_string();
        self.store
            .set_ex(&key, &now, self.config.time_to_live())
            .await
    }

    async fn beat(&self, hostname: &str) -> AliveResult<()> {
        self.write_liveness(hostname).await?;
        self.registry.register(hostname).await
    }
}

#[async_trait]
impl RecurringTask for HeartbeatTask {
    fn class_name(&self) -> &'static str {
        HEARTBEAT_JOB_CLASS
    }

    async fn run(&self, args: &[String]) -> Reschedule {
        let Some(hostname) = args.first() else {
            warn!("Heartbeat job without hostname argument, dropping it");
            return Reschedule::Stop;
        };

        match self.beat(hostname).await {
            Ok(()) => {
                debug!("Heartbeat written for {}", hostname);
                if let Some(callback) = &self.callback {
                    callback(hostname.as_str());
                }
            }
            Err(e) => error!("Failed to write heartbeat for {}: {}", hostname, e),
        }

        Reschedule::After(self.config.heartbeat_interval())
    }
}

/// Enqueue a heartbeat for `hostname` on its own queue, `delay` from now.
pub async fn schedule_heartbeat(
    jobs: &dyn ScheduledJobStore,
    config: &AliveConfig,
    hostname: &str,
    delay: Duration,
) -> AliveResult<ScheduledJob> {
    let job = ScheduledJob::heartbeat(config.heartbeat_queue(hostname), hostname);
    let run_at = epoch_seconds(Utc::now()) + delay.as_secs_f64();
    jobs.schedule(&job, run_at).await?;
    Ok(job)
}

/// Enqueue the first heartbeat unless one is already pending for `hostname`.
///
/// Siblings starting together mostly see each other's job here; a lost race
/// leaves one extra heartbeat chain, which is harmless.
pub async fn ensure_heartbeat_scheduled(
    jobs: &dyn ScheduledJobStore,
    config: &AliveConfig,
    hostname: &str,
) -> AliveResult<bool> {
    if !pending_heartbeats(jobs, hostname).await?.is_empty() {
        debug!("Heartbeat for {} already pending", hostname);
        return Ok(false);
    }
    schedule_heartbeat(jobs, config, hostname, config.heartbeat_interval()).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alive_core::AliveError;
    use alive_infrastructure::{MemoryScheduledSet, MemoryTtlStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore;

    #[async_trait]
    impl TtlStore for FailingStore {
        async fn get(&self, _key: &str) -> AliveResult<Option<String>> {
            Err(AliveError::Store("connection refused".to_string()))
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> AliveResult<()> {
            Err(AliveError::Store("connection refused".to_string()))
        }
        async fn delete(&self, _key: &str) -> AliveResult<bool> {
            Err(AliveError::Store("connection refused".to_string()))
        }
        async fn scan(&self, _c: u64, _p: &str, _n: usize) -> AliveResult<(u64, Vec<String>)> {
            Err(AliveError::Store("connection refused".to_string()))
        }
        async fn ttl(&self, _key: &str) -> AliveResult<Option<Duration>> {
            Err(AliveError::Store("connection refused".to_string()))
        }
        async fn incr(&self, _key: &str) -> AliveResult<i64> {
            Err(AliveError::Store("connection refused".to_string()))
        }
    }

    fn task(
        store: Arc<dyn TtlStore>,
        config: AliveConfig,
        callback: Option<HeartbeatCallback>,
    ) -> HeartbeatTask {
        let config = Arc::new(config);
        let registry = Arc::new(InstanceRegistry::new(
            Arc::clone(&store),
            Arc::new(MemoryScheduledSet::new()),
            Arc::clone(&config),
        ));
        HeartbeatTask::new(store, registry, config, callback)
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_liveness_with_ttl() {
        let store = MemoryTtlStore::new();
        let config = AliveConfig {
            time_to_live: 30,
            ..Default::default()
        };
        let task = task(Arc::new(store.clone()), config, None);

        let next = task.run(&["web-1".to_string()]).await;
        assert_eq!(next, Reschedule::After(Duration::from_secs(10)));

        let key = "SIDEKIQ::LIVENESS_PROBE_TIMESTAMP::web-1";
        assert!(store.get(key).await.unwrap().is_some());
        let ttl = store.ttl(key).await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(30) && ttl > Duration::ZERO);
        assert!(store
            .get("SIDEKIQ_REGISTERED_INSTANCE::web-1")
            .await
            .unwrap()
            .is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_still_reschedules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: HeartbeatCallback = Arc::new(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let task = task(Arc::new(FailingStore), AliveConfig::default(), Some(callback));

        let next = task.run(&["web-1".to_string()]).await;
        assert_eq!(next, Reschedule::After(Duration::from_secs(100)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_runs_after_successful_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: HeartbeatCallback = Arc::new(move |hostname: &str| {
            assert_eq!(hostname, "web-1");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let task = task(Arc::new(MemoryTtlStore::new()), AliveConfig::default(), Some(callback));

        task.run(&["web-1".to_string()]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_hostname_stops() {
        let task = task(Arc::new(MemoryTtlStore::new()), AliveConfig::default(), None);
        assert_eq!(task.run(&[]).await, Reschedule::Stop);
    }

    #[tokio::test]
    async fn test_first_heartbeat_scheduled_once() {
        let jobs = MemoryScheduledSet::new();
        let config = AliveConfig::default();

        assert!(ensure_heartbeat_scheduled(&jobs, &config, "web-1").await.unwrap());
        assert!(!ensure_heartbeat_scheduled(&jobs, &config, "web-1").await.unwrap());
        assert!(ensure_heartbeat_scheduled(&jobs, &config, "web-2").await.unwrap());

        let scheduled = jobs.jobs().await;
        assert_eq!(scheduled.len(), 2);
        assert!(scheduled
            .iter()
            .any(|job| job.queue == "sidekiq_alive-web-1" && job.is_heartbeat_for("web-1")));
    }
}
