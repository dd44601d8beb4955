use std::sync::Arc;

use alive_core::{AliveResult, InstanceKeys, Role, TtlStore};
use tracing::info;

/// Process group of the calling OS process.
pub fn current_process_group() -> i32 {
    // SAFETY: getpgrp takes no arguments and cannot fail.
    unsafe { libc::getpgrp() }
}

/// 进程组领导者选举
///
/// Siblings forked from one worker share a process group id. Each increments
/// the same counter once at startup; the one that sees `1` owns the health
/// endpoint until the group shuts down. There is no lease and no re-election.
pub struct ProcessGroupElection {
    store: Arc<dyn TtlStore>,
    keys: InstanceKeys,
}

impl ProcessGroupElection {
    pub fn new(store: Arc<dyn TtlStore>, keys: InstanceKeys) -> Self {
        Self { store, keys }
    }

    pub async fn elect(&self, pgid: i32) -> AliveResult<Role> {
        let key = self.keys.process_group(pgid);
        let position = self.store.incr(&key).await?;
        let role = if position == 1 {
            Role::Leader
        } else {
            Role::Follower
        };
        info!(
            "Process group {} of {}: joined as #{} ({:?})",
            pgid,
            self.keys.hostname(),
            position,
            role
        );
        Ok(role)
    }

    /// Drop the counter so a recycled pgid starts from zero again.
    pub async fn release(&self, pgid: i32) -> AliveResult<bool> {
        self.store.delete(&self.keys.process_group(pgid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alive_core::AliveConfig;
    use alive_infrastructure::MemoryTtlStore;

    fn election(store: &MemoryTtlStore) -> ProcessGroupElection {
        ProcessGroupElection::new(
            Arc::new(store.clone()),
            InstanceKeys::new(&AliveConfig::default(), "web-1"),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exactly_one_leader_among_concurrent_siblings() {
        let store = MemoryTtlStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let election = election(&store);
            handles.push(tokio::spawn(async move { election.elect(777).await.unwrap() }));
        }

        let mut roles = Vec::new();
        for handle in handles {
            roles.push(handle.await.unwrap());
        }
        assert_eq!(roles.iter().filter(|role| role.is_leader()).count(), 1);
        assert_eq!(
            store
                .get("SIDEKIQ_REGISTERED_INSTANCE_PGRP::web-1::777")
                .await
                .unwrap()
                .as_deref(),
            Some("16")
        );
    }

    #[tokio::test]
    async fn test_release_lets_recycled_pgid_lead_again() {
        let store = MemoryTtlStore::new();
        let first = election(&store);
        assert_eq!(first.elect(42).await.unwrap(), Role::Leader);
        assert_eq!(first.elect(42).await.unwrap(), Role::Follower);

        assert!(first.release(42).await.unwrap());
        assert_eq!(election(&store).elect(42).await.unwrap(), Role::Leader);
    }

    #[tokio::test]
    async fn test_groups_and_hosts_are_independent() {
        let store = MemoryTtlStore::new();
        assert!(election(&store).elect(1).await.unwrap().is_leader());
        assert!(election(&store).elect(2).await.unwrap().is_leader());

        let other_host = ProcessGroupElection::new(
            Arc::new(store.clone()),
            InstanceKeys::new(&AliveConfig::default(), "web-2"),
        );
        assert!(other_host.elect(1).await.unwrap().is_leader());
    }
}
