use std::fmt;
use std::sync::Arc;

pub type HeartbeatCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type LivenessProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// User-supplied hooks that cannot live in [`crate::AliveConfig`].
#[derive(Clone, Default)]
pub struct AliveHooks {
    /// Called with the hostname after every heartbeat write.
    pub heartbeat_callback: Option<HeartbeatCallback>,
    /// Extra condition the liveness route must satisfy.
    pub custom_liveness_probe: Option<LivenessProbe>,
}

impl AliveHooks {
    pub fn with_heartbeat_callback(
        mut self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.heartbeat_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_custom_liveness_probe(
        mut self,
        probe: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.custom_liveness_probe = Some(Arc::new(probe));
        self
    }
}

impl fmt::Debug for AliveHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliveHooks")
            .field("heartbeat_callback", &self.heartbeat_callback.is_some())
            .field("custom_liveness_probe", &self.custom_liveness_probe.is_some())
            .finish()
    }
}
