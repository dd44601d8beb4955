use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alive_core::{
    epoch_seconds, AliveResult, RecurringTask, Reschedule, ScheduledJob, ScheduledJobStore,
};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const DEFAULT_BATCH_SIZE: usize = 100;

/// 定时任务轮询器
///
/// Claims due jobs of one queue, runs the matching [`RecurringTask`] and
/// enqueues the next run when the task asks for one.
pub struct ScheduledJobPoller {
    jobs: Arc<dyn ScheduledJobStore>,
    tasks: HashMap<&'static str, Arc<dyn RecurringTask>>,
    queue: String,
    poll_interval: Duration,
    batch_size: usize,
}

impl ScheduledJobPoller {
    pub fn new(
        jobs: Arc<dyn ScheduledJobStore>,
        queue: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            jobs,
            tasks: HashMap::new(),
            queue: queue.into(),
            poll_interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn register(mut self, task: Arc<dyn RecurringTask>) -> Self {
        self.tasks.insert(task.class_name(), task);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Run every job due now. Returns how many were run.
    pub async fn poll_once(&self) -> AliveResult<usize> {
        let now = epoch_seconds(Utc::now());
        let due = self.jobs.claim_due(&self.queue, now, self.batch_size).await?;

        let mut ran = 0;
        for job in due {
            let Some(task) = self.tasks.get(job.class.as_str()) else {
                warn!("No task registered for job class {}, dropping job {}", job.class, job.jid);
                continue;
            };

            ran += 1;
            match task.run(&job.args).await {
                Reschedule::After(delay) => {
                    let next =
                        ScheduledJob::new(job.class.clone(), job.queue.clone(), job.args.clone());
                    let run_at = epoch_seconds(Utc::now()) + delay.as_secs_f64();
                    if let Err(e) = self.jobs.schedule(&next, run_at).await {
                        error!("Failed to reschedule {} on {}: {}", job.class, job.queue, e);
                    }
                }
                Reschedule::Stop => debug!("Job {} ({}) will not run again", job.jid, job.class),
            }
        }

        Ok(ran)
    }

    /// Poll until a shutdown signal arrives. The returned handle finishes once
    /// the in-flight poll has completed.
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Polling queue {} every {:?}", self.queue, self.poll_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll_once().await {
                            error!("Failed to poll queue {}: {}", self.queue, e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Poller for {} shutting down", self.queue);
                        break;
                    }
                }
            }
        })
    }
}
