use std::net::SocketAddr;
use std::sync::Arc;

use alive_api::{start_server, HealthState, ServerHandle};
use alive_core::{
    resolve_hostname, AliveConfig, AliveError, AliveHooks, AliveResult, InstanceKeys,
    ProcessRegistry, Role, ScheduledJobStore, TtlStore,
};
use alive_infrastructure::{
    connect, MemoryProcessRegistry, MemoryScheduledSet, MemoryTtlStore, RedisConnectionConfig,
    RedisProcessSet, RedisScheduledSet, RedisTtlStore,
};
use alive_worker::{
    current_process_group, ensure_heartbeat_scheduled, HeartbeatTask, InstanceRegistry,
    ProcessGroupElection, ScheduledJobPoller,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Registered,
    /// Leader with the health endpoint up.
    Serving,
    Follower,
    Quiet,
    ShutDown,
}

/// The three stores the lifecycle talks to.
#[derive(Clone)]
pub struct AliveStores {
    pub ttl: Arc<dyn TtlStore>,
    pub jobs: Arc<dyn ScheduledJobStore>,
    pub processes: Arc<dyn ProcessRegistry>,
}

impl AliveStores {
    /// Sidekiq-compatible Redis stores sharing one connection manager.
    pub async fn redis(config: &AliveConfig) -> AliveResult<Self> {
        let conn = connect(&RedisConnectionConfig::new(config.redis_url.clone())).await?;
        Ok(Self {
            ttl: Arc::new(RedisTtlStore::new(conn.clone())),
            jobs: Arc::new(RedisScheduledSet::new(conn.clone())),
            processes: Arc::new(RedisProcessSet::new(conn)),
        })
    }

    /// 内存存储, for a single process without Redis.
    pub fn memory() -> Self {
        Self {
            ttl: Arc::new(MemoryTtlStore::new()),
            jobs: Arc::new(MemoryScheduledSet::new()),
            processes: Arc::new(MemoryProcessRegistry::new()),
        }
    }
}

struct PollerHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// 存活检测应用
///
/// Drives `Init → Registered → Serving|Follower → Quiet → ShutDown`. Store
/// failures along the way are logged and never stop the transition.
pub struct AliveApplication {
    config: Arc<AliveConfig>,
    hostname: String,
    pgid: i32,
    stores: AliveStores,
    hooks: AliveHooks,
    registry: Arc<InstanceRegistry>,
    heartbeat: Arc<HeartbeatTask>,
    state: LifecycleState,
    role: Option<Role>,
    poller: Option<PollerHandle>,
    server: Option<ServerHandle>,
}

impl AliveApplication {
    pub fn new(config: AliveConfig, stores: AliveStores, hooks: AliveHooks) -> Self {
        Self::with_identity(config, stores, hooks, resolve_hostname(), current_process_group())
    }

    /// Same as [`AliveApplication::new`] with an explicit hostname and process group.
    pub fn with_identity(
        config: AliveConfig,
        stores: AliveStores,
        hooks: AliveHooks,
        hostname: impl Into<String>,
        pgid: i32,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(InstanceRegistry::new(
            Arc::clone(&stores.ttl),
            Arc::clone(&stores.jobs),
            Arc::clone(&config),
        ));
        let heartbeat = Arc::new(HeartbeatTask::new(
            Arc::clone(&stores.ttl),
            Arc::clone(&registry),
            Arc::clone(&config),
            hooks.heartbeat_callback.clone(),
        ));

        Self {
            config,
            hostname: hostname.into(),
            pgid,
            stores,
            hooks,
            registry,
            heartbeat,
            state: LifecycleState::Init,
            role: None,
            poller: None,
            server: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Address of the in-process health endpoint, when one is running.
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().and_then(ServerHandle::local_addr)
    }

    fn election(&self) -> ProcessGroupElection {
        ProcessGroupElection::new(
            Arc::clone(&self.stores.ttl),
            InstanceKeys::new(&self.config, self.hostname.clone()),
        )
    }

    /// Register, write the first heartbeat, then elect and serve if leader.
    pub async fn startup(&mut self) -> AliveResult<LifecycleState> {
        if self.state != LifecycleState::Init {
            return Err(AliveError::Internal(format!(
                "startup called in state {:?}",
                self.state
            )));
        }
        info!("{}", self.banner());

        if let Err(e) = self.registry.register(&self.hostname).await {
            error!("Failed to register {}: {}", self.hostname, e);
        }
        if let Err(e) = self.heartbeat.write_liveness(&self.hostname).await {
            error!("Failed to write first heartbeat for {}: {}", self.hostname, e);
        }
        match ensure_heartbeat_scheduled(self.stores.jobs.as_ref(), &self.config, &self.hostname)
            .await
        {
            Ok(true) => debug!("First heartbeat scheduled for {}", self.hostname),
            Ok(false) => {}
            Err(e) => error!("Failed to schedule heartbeat for {}: {}", self.hostname, e),
        }
        self.start_poller();
        self.state = LifecycleState::Registered;

        let role = match self.election().elect(self.pgid).await {
            Ok(role) => role,
            Err(e) => {
                error!("Leader election failed, not serving: {}", e);
                Role::Follower
            }
        };
        self.role = Some(role);

        let state = if role.is_leader() {
            info!("Run health endpoint in {:?} mode", self.config.server_mode);
            let health = HealthState::new(self.hostname.clone(), Arc::clone(&self.stores.processes))
                .with_custom_probe(self.hooks.custom_liveness_probe.clone());
            match start_server(&self.config, health).await {
                Ok(server) => self.server = server,
                Err(e) => error!("Failed to start health endpoint: {}", e),
            }
            LifecycleState::Serving
        } else {
            LifecycleState::Follower
        };
        self.state = state;

        info!("\n\n=================== SidekiqAlive Ready! =================\n");
        Ok(self.state)
    }

    fn start_poller(&mut self) {
        let poller = ScheduledJobPoller::new(
            Arc::clone(&self.stores.jobs),
            self.config.heartbeat_queue(&self.hostname),
            self.config.poll_interval(),
        )
        .register(self.heartbeat.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = Arc::new(poller).start(shutdown_rx);
        self.poller = Some(PollerHandle {
            shutdown_tx,
            handle,
        });
    }

    async fn stop_poller(&mut self) {
        if let Some(PollerHandle {
            shutdown_tx,
            handle,
        }) = self.poller.take()
        {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                error!("Heartbeat poller failed: {}", e);
            }
        }
    }

    /// Stop heartbeating and leave the registry. The liveness record lapses
    /// on its own; the health endpoint keeps answering.
    pub async fn quiet(&mut self) -> AliveResult<LifecycleState> {
        match self.state {
            LifecycleState::Registered | LifecycleState::Serving | LifecycleState::Follower => {}
            state => {
                debug!("Quiet ignored in state {:?}", state);
                return Ok(state);
            }
        }

        self.stop_poller().await;
        match self.registry.unregister(&self.hostname).await {
            Ok(purged) => info!(
                "Unregistered {}, {} pending heartbeat(s) purged",
                self.hostname, purged
            ),
            Err(e) => error!("Failed to unregister {}: {}", self.hostname, e),
        }

        self.state = LifecycleState::Quiet;
        Ok(self.state)
    }

    /// Stop the health endpoint and drop the process-group counter.
    pub async fn shutdown(&mut self) -> AliveResult<LifecycleState> {
        match self.state {
            LifecycleState::ShutDown => return Ok(self.state),
            LifecycleState::Init => {
                self.state = LifecycleState::ShutDown;
                return Ok(self.state);
            }
            _ => {}
        }
        self.quiet().await?;
        info!(
            "\n\n=================== Shutting down SidekiqAlive =================\n\nHostname: {}\n",
            self.hostname
        );

        if let Some(server) = self.server.take() {
            if let Err(e) = server.stop().await {
                error!("Failed to stop health endpoint: {}", e);
            }
        }

        match self.election().release(self.pgid).await {
            Ok(true) => debug!("Process group {} counter removed", self.pgid),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove process group {} counter: {}", self.pgid, e),
        }

        self.state = LifecycleState::ShutDown;
        Ok(self.state)
    }

    fn banner(&self) -> String {
        format!(
            "\n\n=================== SidekiqAlive =================\n\n\
             Hostname: {}\n\
             Port: {}\n\
             Liveness Probe Path: {}\n\
             Sidekiq Busy Count Path: {}\n\
             starting ...\n",
            self.hostname,
            self.config.port,
            self.config.liveness_probe_path,
            self.config.sidekiq_busy_count_path
        )
    }
}
