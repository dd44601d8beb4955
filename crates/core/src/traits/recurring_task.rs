use async_trait::async_trait;

use crate::models::Reschedule;

/// A unit of scheduled work that decides after each run whether to run again.
///
/// Failures are handled inside `run`; the executor only acts on the returned
/// [`Reschedule`].
#[async_trait]
pub trait RecurringTask: Send + Sync {
    /// Job class this task answers to in the scheduled-job store.
    fn class_name(&self) -> &'static str;

    async fn run(&self, args: &[String]) -> Reschedule;
}
