use async_trait::async_trait;

use crate::models::ProcessInfo;
use crate::AliveResult;

/// Active worker processes as reported by the job engine.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    async fn processes(&self) -> AliveResult<Vec<ProcessInfo>>;

    async fn processes_for_host(&self, hostname: &str) -> AliveResult<Vec<ProcessInfo>> {
        Ok(self
            .processes()
            .await?
            .into_iter()
            .filter(|process| process.hostname == hostname)
            .collect())
    }
}
