use std::future::Future;
use std::net::SocketAddr;
use std::process::Stdio;

use alive_core::{AliveConfig, AliveError, AliveResult, ServerMode};
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::routes::{create_routes, HealthState};

/// The only HTTP backend compiled in.
pub const DEFAULT_BACKEND: &str = "axum";

/// 运行中的健康检查服务器
#[derive(Debug)]
pub enum ServerHandle {
    /// Served by a task inside this process.
    Thread {
        shutdown_tx: oneshot::Sender<()>,
        handle: JoinHandle<()>,
        local_addr: SocketAddr,
    },
    /// Served by a child process running `serve`.
    Process { child: Child },
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            ServerHandle::Thread { local_addr, .. } => Some(*local_addr),
            ServerHandle::Process { .. } => None,
        }
    }

    pub fn mode(&self) -> ServerMode {
        match self {
            ServerHandle::Thread { .. } => ServerMode::Thread,
            ServerHandle::Process { .. } => ServerMode::Process,
        }
    }

    /// Stop serving and wait until the listener is gone.
    pub async fn stop(self) -> AliveResult<()> {
        match self {
            ServerHandle::Thread {
                shutdown_tx,
                handle,
                local_addr,
            } => {
                let _ = shutdown_tx.send(());
                handle
                    .await
                    .map_err(|e| AliveError::Server(format!("健康检查服务器任务失败: {e}")))?;
                info!("Health endpoint on {} stopped", local_addr);
            }
            ServerHandle::Process { mut child } => {
                if let Some(pid) = child.id() {
                    // SAFETY: kill(2) on the pid of a child we spawned and have not reaped.
                    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                    if rc != 0 {
                        warn!(
                            "Failed to send SIGTERM to health server {}: {}",
                            pid,
                            std::io::Error::last_os_error()
                        );
                        child.start_kill()?;
                    }
                }
                let status = child.wait().await?;
                info!("Health server process exited with {}", status);
            }
        }
        Ok(())
    }
}

/// Bind the configured address. A port already taken is expected when a
/// sibling owns it and yields `None`.
pub async fn bind(config: &AliveConfig) -> AliveResult<Option<TcpListener>> {
    let address = config.bind_address();
    match TcpListener::bind(&address).await.map_err(AliveError::from) {
        Ok(listener) => Ok(Some(listener)),
        Err(e) if e.is_addr_in_use() => {
            warn!("Health endpoint not started, {} is already in use", address);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Serve the health routes on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    config: &AliveConfig,
    state: HealthState,
    shutdown: F,
) -> AliveResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_routes(config, state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AliveError::Server(format!("健康检查服务器运行失败: {e}")))
}

fn check_backend(config: &AliveConfig) {
    if config.server != DEFAULT_BACKEND {
        warn!(
            "HTTP backend {:?} is not available, using {}",
            config.server, DEFAULT_BACKEND
        );
    }
}

/// Start the health endpoint the way `server_mode` asks for.
pub async fn start_server(
    config: &AliveConfig,
    state: HealthState,
) -> AliveResult<Option<ServerHandle>> {
    match config.server_mode {
        ServerMode::Thread => start_thread_server(config, state).await,
        ServerMode::Process => {
            if state.custom_probe.is_some() {
                warn!("Custom liveness probe is not carried into the health server process");
            }
            start_process_server(config).await.map(Some)
        }
    }
}

pub async fn start_thread_server(
    config: &AliveConfig,
    state: HealthState,
) -> AliveResult<Option<ServerHandle>> {
    check_backend(config);
    let Some(listener) = bind(config).await? else {
        return Ok(None);
    };
    let local_addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let config = config.clone();
    let handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = serve(listener, &config, state, shutdown).await {
            error!("{}", e);
        }
    });

    info!("Health endpoint listening on http://{}", local_addr);
    Ok(Some(ServerHandle::Thread {
        shutdown_tx,
        handle,
        local_addr,
    }))
}

/// Run the health endpoint in a child process.
///
/// The child is this executable started with `serve` and the configuration as
/// JSON; it binds on its own and exits on `SIGTERM`.
pub async fn start_process_server(config: &AliveConfig) -> AliveResult<ServerHandle> {
    check_backend(config);
    let executable = std::env::current_exe()?;
    let child = Command::new(&executable)
        .arg("serve")
        .arg("--inline-config")
        .arg(config.to_json()?)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    info!(
        "Health endpoint process {} started for {}",
        child.id().unwrap_or_default(),
        config.bind_address()
    );
    Ok(ServerHandle::Process { child })
}
