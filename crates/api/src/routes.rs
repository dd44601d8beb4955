use std::sync::Arc;

use alive_core::hooks::LivenessProbe;
use alive_core::{AliveConfig, ProcessRegistry};
use axum::{routing::get, Router};

use crate::handlers::{busy_count, liveness_probe, not_found};

/// 健康检查端点状态
#[derive(Clone)]
pub struct HealthState {
    pub hostname: String,
    pub processes: Arc<dyn ProcessRegistry>,
    pub custom_probe: Option<LivenessProbe>,
}

impl HealthState {
    pub fn new(hostname: impl Into<String>, processes: Arc<dyn ProcessRegistry>) -> Self {
        Self {
            hostname: hostname.into(),
            processes,
            custom_probe: None,
        }
    }

    pub fn with_custom_probe(mut self, probe: Option<LivenessProbe>) -> Self {
        self.custom_probe = probe;
        self
    }
}

/// 创建健康检查路由
///
/// Paths come from configuration and are matched exactly; everything else
/// falls through to `404 Not found`.
pub fn create_routes(config: &AliveConfig, state: HealthState) -> Router {
    Router::new()
        .route(&config.liveness_probe_path, get(liveness_probe))
        .route(&config.sidekiq_busy_count_path, get(busy_count))
        .fallback(not_found)
        .with_state(state)
}
