pub mod job_store;
pub mod process_registry;
pub mod recurring_task;
pub mod store;

pub use job_store::*;
pub use process_registry::*;
pub use recurring_task::*;
pub use store::*;
