use std::sync::Arc;

use tokio::signal;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Running,
    Quiet,
    ShuttingDown,
}

/// 优雅关闭管理器
///
/// Two one-shot broadcasts: `quiet` (stop taking new work, leave the registry)
/// and `shutdown`. Shutdown always goes through quiet first, so a subscriber
/// of both sees them in that order.
#[derive(Clone)]
pub struct ShutdownManager {
    quiet_tx: broadcast::Sender<()>,
    shutdown_tx: broadcast::Sender<()>,
    phase: Arc<RwLock<Phase>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (quiet_tx, _) = broadcast::channel(4);
        let (shutdown_tx, _) = broadcast::channel(4);

        Self {
            quiet_tx,
            shutdown_tx,
            phase: Arc::new(RwLock::new(Phase::Running)),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    /// 订阅安静信号; fires immediately when quiet already happened.
    pub async fn subscribe_quiet(&self) -> broadcast::Receiver<()> {
        let phase = self.phase.read().await;
        Self::subscribe(&self.quiet_tx, *phase >= Phase::Quiet)
    }

    /// 订阅关闭信号; fires immediately when shutdown already happened.
    pub async fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        let phase = self.phase.read().await;
        Self::subscribe(&self.shutdown_tx, *phase >= Phase::ShuttingDown)
    }

    fn subscribe(tx: &broadcast::Sender<()>, fired: bool) -> broadcast::Receiver<()> {
        if fired {
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        } else {
            tx.subscribe()
        }
    }

    pub async fn quiet(&self) {
        let mut phase = self.phase.write().await;
        if *phase >= Phase::Quiet {
            debug!("安静信号已经发送过");
            return;
        }
        *phase = Phase::Quiet;
        debug!("发送安静信号给 {} 个订阅者", self.quiet_tx.receiver_count());
        let _ = self.quiet_tx.send(());
    }

    /// 触发关闭
    pub async fn shutdown(&self) {
        self.quiet().await;

        let mut phase = self.phase.write().await;
        if *phase == Phase::ShuttingDown {
            debug!("关闭管理器已经触发过关闭");
            return;
        }
        *phase = Phase::ShuttingDown;
        debug!("发送关闭信号给 {} 个订阅者", self.shutdown_tx.receiver_count());
        let _ = self.shutdown_tx.send(());
        info!("关闭信号已发送");
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Map process signals onto the manager until shutdown is requested.
///
/// `SIGTSTP` means quiet, `SIGTERM` and Ctrl+C mean shutdown.
pub async fn listen_for_signals(manager: ShutdownManager) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        let mut terminate = unix_signal(SignalKind::terminate())?;
        let mut tstp = unix_signal(SignalKind::from_raw(libc::SIGTSTP))?;

        loop {
            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("收到Ctrl+C信号");
                    break;
                }
                _ = terminate.recv() => {
                    info!("收到SIGTERM信号");
                    break;
                }
                _ = tstp.recv() => {
                    info!("收到SIGTSTP信号, 进入安静状态");
                    manager.quiet().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("收到Ctrl+C信号");
    }

    manager.shutdown().await;
    Ok(())
}
