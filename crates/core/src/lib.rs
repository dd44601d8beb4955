pub mod config;
pub mod errors;
pub mod hooks;
pub mod keys;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{is_disabled, resolve_hostname, AliveConfig, ServerMode};
pub use errors::*;
pub use hooks::AliveHooks;
pub use keys::InstanceKeys;
pub use logging::{init_logging, LogFormat, LogLevel};
pub use models::{
    epoch_seconds, ProcessInfo, Reschedule, Role, ScheduledEntry, ScheduledJob,
    HEARTBEAT_JOB_CLASS,
};
pub use traits::{ProcessRegistry, RecurringTask, ScheduledJobStore, TtlStore, SCAN_ORIGIN};
