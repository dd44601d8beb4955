//! # SidekiqAlive
//!
//! Worker实例存活检测: 注册表、心跳、进程组领导者选举和健康检查端点。
//!
//! [`app::AliveApplication`] 负责整个生命周期，[`shutdown::ShutdownManager`]
//! 把进程信号转换为 quiet / shutdown 两个阶段。

pub mod app;
pub mod shutdown;

pub use app::{AliveApplication, AliveStores, LifecycleState};
pub use shutdown::{listen_for_signals, Phase, ShutdownManager};
