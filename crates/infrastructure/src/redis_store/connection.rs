use std::time::Duration;

use alive_core::{AliveError, AliveResult};
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::time::sleep;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RedisConnectionConfig {
    pub url: String,
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
}

impl RedisConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Open a managed connection and verify it with PING.
///
/// The returned manager reconnects on its own and is cheap to clone.
pub async fn connect(config: &RedisConnectionConfig) -> AliveResult<ConnectionManager> {
    let client = Client::open(config.url.as_str()).map_err(|e| {
        AliveError::Configuration(format!("Failed to create Redis client: {e}"))
    })?;

    let attempts = config.max_retry_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match try_connect(&client).await {
            Ok(manager) => {
                if attempt > 0 {
                    debug!(
                        "Successfully connected to Redis after {} attempts",
                        attempt + 1
                    );
                }
                return Ok(manager);
            }
            Err(e) => {
                if attempt + 1 < attempts {
                    warn!(
                        "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        attempts,
                        e,
                        config.retry_delay
                    );
                    sleep(config.retry_delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    let error_msg = format!(
        "Failed to connect to Redis after {} attempts. Last error: {}",
        attempts,
        last_error.map_or("Unknown".to_string(), |e| e.to_string())
    );
    error!("{}", error_msg);
    Err(AliveError::Store(error_msg))
}

async fn try_connect(client: &Client) -> redis::RedisResult<ConnectionManager> {
    let mut manager = client.get_connection_manager().await?;
    let _: String = redis::cmd("PING").query_async(&mut manager).await?;
    Ok(manager)
}
