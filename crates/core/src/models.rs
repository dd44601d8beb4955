use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job class of the heartbeat task in the scheduled-job store.
pub const HEARTBEAT_JOB_CLASS: &str = "SidekiqAlive::Worker";

/// 定时任务
///
/// Serialised as JSON into the scheduled-job store. `args[0]` carries the
/// hostname for heartbeat jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub jid: String,
    pub class: String,
    pub queue: String,
    pub args: Vec<String>,
    pub created_at: f64,
}

impl ScheduledJob {
    pub fn new(class: impl Into<String>, queue: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            jid: uuid::Uuid::new_v4().simple().to_string(),
            class: class.into(),
            queue: queue.into(),
            args,
            created_at: epoch_seconds(Utc::now()),
        }
    }

    pub fn heartbeat(queue: impl Into<String>, hostname: &str) -> Self {
        Self::new(HEARTBEAT_JOB_CLASS, queue, vec![hostname.to_string()])
    }

    /// True for heartbeat jobs whose hostname argument is exactly `hostname`.
    pub fn is_heartbeat_for(&self, hostname: &str) -> bool {
        self.class == HEARTBEAT_JOB_CLASS
            && self.args.first().map(String::as_str) == Some(hostname)
    }
}

/// A job as it sits in the store, with the raw member needed to remove it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEntry {
    pub job: ScheduledJob,
    pub member: String,
    pub run_at: f64,
}

/// Worker进程信息, as published by the job engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub identity: String,
    pub hostname: String,
    pub pid: u32,
    pub busy: u64,
    pub concurrency: u64,
    pub queues: Vec<String>,
    pub beat: Option<f64>,
}

/// Outcome of a process-group election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

/// What a recurring task wants after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    After(Duration),
    Stop,
}

pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
