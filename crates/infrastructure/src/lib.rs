pub mod memory;
pub mod redis_store;

pub use memory::{MemoryProcessRegistry, MemoryScheduledSet, MemoryTtlStore};
pub use redis_store::{
    connect, RedisConnectionConfig, RedisProcessSet, RedisScheduledSet, RedisTtlStore,
};
