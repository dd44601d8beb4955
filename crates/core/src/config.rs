use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::logging::{LogFormat, LogLevel};
use crate::{AliveError, AliveResult};

/// Environment prefix for overrides, e.g. `SIDEKIQ_ALIVE_PORT`.
pub const ENV_PREFIX: &str = "SIDEKIQ_ALIVE";
/// Setting this to any non-empty value suppresses all startup logic.
pub const DISABLE_ENV: &str = "DISABLE_SIDEKIQ_ALIVE";
pub const HOSTNAME_NOT_SET: &str = "HOSTNAME_NOT_SET";

/// Grace added on top of the liveness TTL for registration records.
pub const REGISTRATION_GRACE_SECONDS: u64 = 60;

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/sidekiq_alive.toml",
    "sidekiq_alive.toml",
    "/etc/sidekiq_alive/config.toml",
];

/// How the health endpoint is hosted by the elected leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// A task inside the worker process, sharing its store connection.
    Thread,
    /// A child OS process with its own store connection.
    Process,
}

/// 存活检测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliveConfig {
    pub host: String,
    pub port: u16,
    pub liveness_probe_path: String,
    pub sidekiq_busy_count_path: String,
    pub liveness_key: String,
    /// Liveness record TTL in seconds.
    pub time_to_live: u64,
    pub registered_instance_key: String,
    /// Heartbeat queue prefix; the effective queue is `<queue>-<hostname>`.
    pub queue: String,
    pub server_mode: ServerMode,
    /// HTTP handler backend name.
    pub server: String,
    /// Registration record TTL override in seconds.
    pub registration_ttl: Option<u64>,
    pub redis_url: String,
    pub poll_interval_seconds: u64,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for AliveConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7433,
            liveness_probe_path: "/liveness_probe".to_string(),
            sidekiq_busy_count_path: "/busy_count".to_string(),
            liveness_key: "SIDEKIQ::LIVENESS_PROBE_TIMESTAMP".to_string(),
            time_to_live: 5 * 60,
            registered_instance_key: "SIDEKIQ_REGISTERED_INSTANCE".to_string(),
            queue: "sidekiq_alive".to_string(),
            server_mode: ServerMode::Thread,
            server: "axum".to_string(),
            registration_ttl: None,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            poll_interval_seconds: 5,
            log_level: LogLevel::Info,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AliveConfig {
    /// Defaults overlaid with `SIDEKIQ_ALIVE_*` variables. No file is read.
    ///
    /// Values assigned on the returned struct afterwards are never touched by
    /// the environment again unless this is called anew.
    pub fn from_env() -> AliveResult<Self> {
        Self::build(None, None)
    }

    /// Load configuration
    ///
    /// Load order:
    /// 1. Built-in defaults (`REDIS_URL` replaces the default redis url)
    /// 2. Config file (TOML). Without an explicit path the default paths are tried
    /// 3. `SIDEKIQ_ALIVE_*` environment overrides, highest priority
    pub fn load(config_path: Option<&str>) -> AliveResult<Self> {
        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(AliveError::Configuration(format!(
                        "配置文件不存在: {path}"
                    )));
                }
                Self::build(Some(Path::new(path)), None)
            }
            None => {
                let found = DEFAULT_CONFIG_PATHS
                    .iter()
                    .map(Path::new)
                    .find(|path| path.exists());
                Self::build(found, None)
            }
        }
    }

    /// Same as [`AliveConfig::load`] but reads variables from `env` instead of the
    /// process environment.
    pub fn load_with_env(
        config_path: Option<&Path>,
        env: config::Map<String, String>,
    ) -> AliveResult<Self> {
        Self::build(config_path, Some(env))
    }

    fn build(
        config_path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> AliveResult<Self> {
        let redis_url = match &env {
            Some(vars) => vars.get("REDIS_URL").cloned(),
            None => std::env::var("REDIS_URL").ok(),
        };

        let mut builder = ConfigBuilder::builder();
        if let Some(url) = redis_url.filter(|url| !url.is_empty()) {
            builder = builder.set_default("redis_url", url).map_err(config_error)?;
        }
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true)
                .source(env),
        );

        let config: AliveConfig = builder
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration handed over as JSON, used by the process-mode child.
    pub fn from_json(json: &str) -> AliveResult<Self> {
        let config: AliveConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> AliveResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_toml(toml_str: &str) -> AliveResult<Self> {
        let config: AliveConfig = toml::from_str(toml_str)
            .map_err(|e| AliveError::Configuration(format!("解析TOML配置失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AliveResult<()> {
        if self.time_to_live == 0 {
            return Err(AliveError::Configuration(
                "time_to_live必须大于0".to_string(),
            ));
        }
        if self.poll_interval_seconds == 0 {
            return Err(AliveError::Configuration(
                "poll_interval_seconds必须大于0".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(AliveError::Configuration("host不能为空".to_string()));
        }

        for (name, path) in [
            ("liveness_probe_path", &self.liveness_probe_path),
            ("sidekiq_busy_count_path", &self.sidekiq_busy_count_path),
        ] {
            if !path.starts_with('/') {
                return Err(AliveError::Configuration(format!(
                    "{name} must start with '/': {path}"
                )));
            }
            if path.contains('{') || path.contains('}') {
                return Err(AliveError::Configuration(format!(
                    "{name} must be a literal path: {path}"
                )));
            }
        }
        if self.liveness_probe_path == self.sidekiq_busy_count_path {
            return Err(AliveError::Configuration(format!(
                "liveness_probe_path and sidekiq_busy_count_path are both {}",
                self.liveness_probe_path
            )));
        }

        for (name, value) in [
            ("liveness_key", &self.liveness_key),
            ("registered_instance_key", &self.registered_instance_key),
            ("queue", &self.queue),
            ("redis_url", &self.redis_url),
        ] {
            if value.is_empty() {
                return Err(AliveError::Configuration(format!("{name}不能为空")));
            }
        }

        Ok(())
    }

    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live)
    }

    pub fn registration_ttl(&self) -> Duration {
        Duration::from_secs(
            self.registration_ttl
                .unwrap_or(self.time_to_live + REGISTRATION_GRACE_SECONDS),
        )
    }

    /// A third of the TTL, so two missed runs still leave the record alive.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs((self.time_to_live / 3).max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn heartbeat_queue(&self, hostname: &str) -> String {
        format!("{}-{}", self.queue, hostname)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn config_error(e: config::ConfigError) -> AliveError {
    AliveError::Configuration(e.to_string())
}

/// Instance identity: `HOSTNAME`, then the OS hostname.
pub fn resolve_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| HOSTNAME_NOT_SET.to_string())
}

pub fn is_disabled() -> bool {
    std::env::var(DISABLE_ENV)
        .map(|value| !value.is_empty())
        .unwrap_or(false)
}
