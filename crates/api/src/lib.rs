//! # Alive API
//!
//! 健康检查HTTP端点，只在进程组的领导者上运行。
//!
//! ## 路由
//!
//! - `GET <liveness_probe_path>` (默认 `/liveness_probe`): `200 Alive!` 当任务引擎
//!   报告至少一个属于本实例hostname的活动进程，否则 `404`
//! - `GET <sidekiq_busy_count_path>` (默认 `/busy_count`): 本实例所有进程的 busy 之和
//! - 其他路径: `404 Not found`
//!
//! ## 运行模式
//!
//! - `thread`: 在当前进程内的tokio任务上运行，停止时发送关闭信号并等待
//! - `process`: 以 `serve` 子命令启动当前可执行文件，停止时发送 `SIGTERM` 并等待退出
//!
//! ```rust,ignore
//! use alive_api::{start_server, HealthState};
//!
//! let state = HealthState::new(hostname, processes);
//! if let Some(server) = start_server(&config, state).await? {
//!     // ...
//!     server.stop().await?;
//! }
//! ```

pub mod handlers;
pub mod routes;
pub mod server;

pub use routes::{create_routes, HealthState};
pub use server::{
    bind, serve, start_process_server, start_server, start_thread_server, ServerHandle,
    DEFAULT_BACKEND,
};
