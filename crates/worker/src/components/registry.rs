use std::collections::BTreeSet;
use std::sync::Arc;

use alive_core::keys::{hostname_from_registration_key, registration_key, registration_pattern};
use alive_core::{AliveConfig, AliveResult, ScheduledJobStore, TtlStore, SCAN_ORIGIN};
use tracing::{debug, error, info};

use super::cleanup::purge_pending;

const SCAN_COUNT: usize = 100;

/// 实例注册表
///
/// Tracks running worker instances through expiring registration records.
pub struct InstanceRegistry {
    store: Arc<dyn TtlStore>,
    jobs: Arc<dyn ScheduledJobStore>,
    config: Arc<AliveConfig>,
}

impl InstanceRegistry {
    pub fn new(
        store: Arc<dyn TtlStore>,
        jobs: Arc<dyn ScheduledJobStore>,
        config: Arc<AliveConfig>,
    ) -> Self {
        Self {
            store,
            jobs,
            config,
        }
    }

    /// Write the registration record. Calling again extends its TTL.
    pub async fn register(&self, hostname: &str) -> AliveResult<()> {
        let key = registration_key(&self.config.registered_instance_key, hostname);
        let now = chrono::Utc::now().timestamp().to_string();
        self.store
            .set_ex(&key, &now, self.config.registration_ttl())
            .await?;
        debug!("Registered instance {} until +{:?}", hostname, self.config.registration_ttl());
        Ok(())
    }

    /// Delete the registration record and purge the instance's pending heartbeats.
    ///
    /// The purge runs even when the delete fails; that error is returned
    /// afterwards. A failed purge is only logged. Returns the number of
    /// purged jobs.
    pub async fn unregister(&self, hostname: &str) -> AliveResult<usize> {
        let key = registration_key(&self.config.registered_instance_key, hostname);
        let deleted = self.store.delete(&key).await;

        let purged = match purge_pending(self.jobs.as_ref(), hostname).await {
            Ok(purged) => purged,
            Err(e) => {
                error!("Failed to purge pending heartbeats for {}: {}", hostname, e);
                0
            }
        };

        if let Err(e) = deleted {
            error!("Failed to delete registration of {}: {}", hostname, e);
            return Err(e);
        }
        info!(
            "Unregistered instance {} ({} pending heartbeat(s) purged)",
            hostname, purged
        );
        Ok(purged)
    }

    pub async fn is_registered(&self, hostname: &str) -> AliveResult<bool> {
        let key = registration_key(&self.config.registered_instance_key, hostname);
        Ok(self.store.get(&key).await?.is_some())
    }

    /// Hostnames of every registered instance.
    ///
    /// Walks the full SCAN cursor; pages can be partial, unordered or repeat keys.
    pub async fn list_registered(&self) -> AliveResult<BTreeSet<String>> {
        let prefix = &self.config.registered_instance_key;
        let pattern = registration_pattern(prefix);

        let mut hostnames = BTreeSet::new();
        let mut cursor = SCAN_ORIGIN;
        loop {
            let (next, keys) = self.store.scan(cursor, &pattern, SCAN_COUNT).await?;
            hostnames.extend(
                keys.iter()
                    .filter_map(|key| hostname_from_registration_key(prefix, key))
                    .map(str::to_string),
            );
            cursor = next;
            if cursor == SCAN_ORIGIN {
                break;
            }
        }

        Ok(hostnames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alive_core::{AliveError, ScheduledJob};
    use alive_infrastructure::{MemoryScheduledSet, MemoryTtlStore};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Store whose deletes always fail.
    struct BrokenDeleteStore(MemoryTtlStore);

    #[async_trait]
    impl TtlStore for BrokenDeleteStore {
        async fn get(&self, key: &str) -> AliveResult<Option<String>> {
            self.0.get(key).await
        }

        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AliveResult<()> {
            self.0.set_ex(key, value, ttl).await
        }

        async fn delete(&self, _key: &str) -> AliveResult<bool> {
            Err(AliveError::Store("connection reset".to_string()))
        }

        async fn scan(
            &self,
            cursor: u64,
            pattern: &str,
            count: usize,
        ) -> AliveResult<(u64, Vec<String>)> {
            self.0.scan(cursor, pattern, count).await
        }

        async fn ttl(&self, key: &str) -> AliveResult<Option<Duration>> {
            self.0.ttl(key).await
        }

        async fn incr(&self, key: &str) -> AliveResult<i64> {
            self.0.incr(key).await
        }
    }

    fn registry(
        store: &MemoryTtlStore,
        jobs: &MemoryScheduledSet,
        config: AliveConfig,
    ) -> InstanceRegistry {
        InstanceRegistry::new(
            Arc::new(store.clone()),
            Arc::new(jobs.clone()),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn test_register_then_list() {
        let store = MemoryTtlStore::new();
        let jobs = MemoryScheduledSet::new();
        let registry = registry(&store, &jobs, AliveConfig::default());

        registry.register("web-1").await.unwrap();
        registry.register("web-2").await.unwrap();

        let listed = registry.list_registered().await.unwrap();
        assert!(listed.contains("web-1"));
        assert!(listed.contains("web-2"));
        assert!(registry.is_registered("web-1").await.unwrap());

        let ttl = store
            .ttl("SIDEKIQ_REGISTERED_INSTANCE::web-1")
            .await
            .unwrap()
            .unwrap();
        assert!(ttl > Duration::from_secs(300) && ttl <= Duration::from_secs(360));
    }

    #[tokio::test]
    async fn test_list_spans_many_scan_pages() {
        let store = MemoryTtlStore::with_scan_page_size(2);
        let jobs = MemoryScheduledSet::new();
        let registry = registry(&store, &jobs, AliveConfig::default());

        for i in 0..9 {
            registry.register(&format!("web-{i}")).await.unwrap();
        }
        // leadership counters share the prefix but are not instances
        store
            .incr("SIDEKIQ_REGISTERED_INSTANCE_PGRP::web-1::100")
            .await
            .unwrap();

        let listed = registry.list_registered().await.unwrap();
        assert_eq!(listed.len(), 9);
        assert!(listed.iter().all(|hostname| hostname.starts_with("web-")));
    }

    #[tokio::test]
    async fn test_unregister_purges_only_own_heartbeats() {
        let store = MemoryTtlStore::new();
        let jobs = MemoryScheduledSet::new();
        let config = AliveConfig::default();
        let registry = registry(&store, &jobs, config.clone());

        registry.register("web-1").await.unwrap();
        registry.register("web-10").await.unwrap();
        jobs.schedule(&ScheduledJob::heartbeat(config.heartbeat_queue("web-1"), "web-1"), 1.0)
            .await
            .unwrap();
        jobs.schedule(&ScheduledJob::heartbeat(config.heartbeat_queue("web-10"), "web-10"), 1.0)
            .await
            .unwrap();

        let purged = registry.unregister("web-1").await.unwrap();
        assert_eq!(purged, 1);

        let listed = registry.list_registered().await.unwrap();
        assert!(!listed.contains("web-1"));
        assert!(listed.contains("web-10"));

        let remaining = jobs.jobs().await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_heartbeat_for("web-10"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_expires_without_refresh() {
        let store = MemoryTtlStore::new();
        let jobs = MemoryScheduledSet::new();
        let config = AliveConfig {
            time_to_live: 10,
            ..Default::default()
        };
        let registry = registry(&store, &jobs, config);

        registry.register("web-1").await.unwrap();
        tokio::time::advance(Duration::from_secs(71)).await;
        assert!(registry.list_registered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_purges_even_when_delete_fails() {
        let jobs = MemoryScheduledSet::new();
        let config = AliveConfig::default();
        let registry = InstanceRegistry::new(
            Arc::new(BrokenDeleteStore(MemoryTtlStore::new())),
            Arc::new(jobs.clone()),
            Arc::new(config.clone()),
        );

        registry.register("web-1").await.unwrap();
        jobs.schedule(&ScheduledJob::heartbeat(config.heartbeat_queue("web-1"), "web-1"), 1.0)
            .await
            .unwrap();

        assert!(registry.unregister("web-1").await.is_err());
        assert!(jobs.is_empty().await);
    }
}
