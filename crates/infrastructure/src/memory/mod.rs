//! In-memory implementations of the store seams.
//!
//! Used for single-process deployments and tests. Expiry follows
//! `tokio::time::Instant`, so paused-clock tests can advance past a TTL.

mod glob;
pub mod process_registry;
pub mod scheduled_set;
pub mod store;

pub use glob::glob_match;
pub use process_registry::MemoryProcessRegistry;
pub use scheduled_set::MemoryScheduledSet;
pub use store::MemoryTtlStore;
