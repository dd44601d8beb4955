use std::collections::HashMap;
use std::sync::Arc;

use alive_core::{AliveResult, ProcessInfo, ProcessRegistry};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process registry fed directly by the embedding worker.
#[derive(Debug, Clone, Default)]
pub struct MemoryProcessRegistry {
    processes: Arc<RwLock<HashMap<String, ProcessInfo>>>,
}

impl MemoryProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, process: ProcessInfo) {
        let mut processes = self.processes.write().await;
        processes.insert(process.identity.clone(), process);
    }

    pub async fn remove(&self, identity: &str) -> bool {
        self.processes.write().await.remove(identity).is_some()
    }

    pub async fn set_busy(&self, identity: &str, busy: u64) -> bool {
        let mut processes = self.processes.write().await;
        match processes.get_mut(identity) {
            Some(process) => {
                process.busy = busy;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ProcessRegistry for MemoryProcessRegistry {
    async fn processes(&self) -> AliveResult<Vec<ProcessInfo>> {
        let processes = self.processes.read().await;
        let mut list: Vec<ProcessInfo> = processes.values().cloned().collect();
        list.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(list)
    }
}
