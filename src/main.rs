use std::sync::Arc;
use std::time::Duration;

use alive_api::{bind, serve, HealthState};
use alive_core::{
    init_logging, is_disabled, resolve_hostname, AliveConfig, AliveHooks, LogFormat, LogLevel,
};
use alive_infrastructure::{connect, RedisConnectionConfig, RedisProcessSet};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use sidekiq_alive::app::{AliveApplication, AliveStores};
use sidekiq_alive::shutdown::{listen_for_signals, ShutdownManager};
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

fn cli() -> Command {
    Command::new("sidekiq-alive")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Worker实例存活检测")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别, 默认取配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式, 默认取配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("run").about("注册实例、发送心跳并在领导者上提供健康检查 (默认)"))
        .subcommand(
            Command::new("serve")
                .about("只运行健康检查端点, 由process模式启动")
                .arg(
                    Arg::new("inline-config")
                        .long("inline-config")
                        .value_name("JSON")
                        .help("JSON格式的完整配置")
                        .required(true),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    run(cli().get_matches()).await
}

async fn run(matches: ArgMatches) -> Result<()> {
    // checked before config and logging, which may themselves fail
    if is_disabled() {
        return Ok(());
    }

    let inline_config = matches
        .subcommand_matches("serve")
        .and_then(|serve| serve.get_one::<String>("inline-config"));

    let config = match inline_config {
        Some(json) => AliveConfig::from_json(json).context("解析inline配置失败")?,
        None => {
            let config_path = matches.get_one::<String>("config").map(String::as_str);
            AliveConfig::load(config_path)
                .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<default>")))?
        }
    };

    let (log_level, log_format) = logging_options(&matches, &config)?;
    init_logging(log_level, log_format).context("初始化日志失败")?;

    match inline_config {
        Some(_) => run_health_server(config).await,
        None => run_lifecycle(config).await,
    }
}

fn logging_options(matches: &ArgMatches, config: &AliveConfig) -> Result<(LogLevel, LogFormat)> {
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => level.parse::<LogLevel>()?,
        None => config.log_level,
    };
    let format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<LogFormat>()?,
        None => config.log_format,
    };
    Ok((level, format))
}

/// 完整生命周期: startup, quiet on SIGTSTP, shutdown on SIGTERM/Ctrl+C.
async fn run_lifecycle(config: AliveConfig) -> Result<()> {
    info!("连接Redis: {}", mask_redis_url(&config.redis_url));
    let stores = AliveStores::redis(&config)
        .await
        .context("连接Redis失败")?;

    let mut app = AliveApplication::new(config, stores, AliveHooks::default());
    let shutdown_manager = ShutdownManager::new();
    let mut quiet_rx = shutdown_manager.subscribe_quiet().await;
    let mut shutdown_rx = shutdown_manager.subscribe_shutdown().await;

    let signals = tokio::spawn(listen_for_signals(shutdown_manager.clone()));

    app.startup().await.context("启动失败")?;

    let _ = quiet_rx.recv().await;
    app.quiet().await.context("进入安静状态失败")?;

    let _ = shutdown_rx.recv().await;
    info!("收到关闭信号，开始优雅关闭...");

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app.shutdown()).await {
        Ok(Ok(_)) => info!("已优雅关闭"),
        Ok(Err(e)) => error!("关闭时发生错误: {}", e),
        Err(_) => warn!("关闭超时，强制退出"),
    }

    match signals.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("信号处理失败: {}", e),
        Err(e) => error!("信号处理任务失败: {}", e),
    }
    Ok(())
}

/// process模式的子进程: 只提供健康检查端点直到SIGTERM.
async fn run_health_server(config: AliveConfig) -> Result<()> {
    let Some(listener) = bind(&config).await.context("绑定健康检查端口失败")? else {
        return Ok(());
    };

    let conn = connect(&RedisConnectionConfig::new(config.redis_url.clone()))
        .await
        .context("连接Redis失败")?;
    let state = HealthState::new(resolve_hostname(), Arc::new(RedisProcessSet::new(conn)));

    let shutdown_manager = ShutdownManager::new();
    let mut shutdown_rx = shutdown_manager.subscribe_shutdown().await;
    tokio::spawn(listen_for_signals(shutdown_manager));

    info!("Health endpoint listening on http://{}", listener.local_addr()?);
    serve(listener, &config, state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await
    .context("健康检查服务器运行失败")?;

    info!("Health endpoint stopped");
    Ok(())
}

/// 屏蔽Redis URL中的密码
fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let mut masked = url.to_string();
            masked.replace_range(colon_pos + 1..at_pos, "***");
            return masked;
        }
    }
    url.to_string()
}
