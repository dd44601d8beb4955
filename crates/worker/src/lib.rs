pub mod components;

pub use components::{
    current_process_group, ensure_heartbeat_scheduled, pending_heartbeats, purge_pending,
    schedule_heartbeat, HeartbeatTask, InstanceRegistry, ProcessGroupElection,
    ScheduledJobPoller,
};
