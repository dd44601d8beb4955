pub mod cleanup;
pub mod election;
pub mod heartbeat;
pub mod poller;
pub mod registry;

pub use cleanup::{pending_heartbeats, purge_pending};
pub use election::{current_process_group, ProcessGroupElection};
pub use heartbeat::{ensure_heartbeat_scheduled, schedule_heartbeat, HeartbeatTask};
pub use poller::ScheduledJobPoller;
pub use registry::InstanceRegistry;
