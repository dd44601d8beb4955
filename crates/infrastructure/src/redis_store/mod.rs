//! Redis implementations of the store seams.
//!
//! The process layout follows Sidekiq's so the health endpoint can sit next
//! to an existing Sidekiq deployment. Heartbeats use Sidekiq's job payload
//! but a sorted set of their own.

mod connection;
pub mod process_set;
pub mod scheduled_set;
pub mod ttl_store;

pub use connection::{connect, RedisConnectionConfig};
pub use process_set::RedisProcessSet;
pub use scheduled_set::{RedisScheduledSet, SCHEDULE_KEY};
pub use ttl_store::RedisTtlStore;

use alive_core::AliveError;

pub(crate) fn store_error(command: &str, e: redis::RedisError) -> AliveError {
    AliveError::Store(format!("Redis {command} failed: {e}"))
}
