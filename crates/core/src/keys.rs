//! Store key layout for one worker instance.
//!
//! ```text
//! <liveness_key>::<hostname>                       liveness timestamp, TTL = time_to_live
//! <registered_instance_key>::<hostname>            registration timestamp, TTL = registration_ttl
//! <registered_instance_key>_PGRP::<hostname>::<pgid>  leadership counter, no TTL
//! ```

use crate::config::AliveConfig;

pub const KEY_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceKeys {
    hostname: String,
    liveness_key: String,
    registered_instance_key: String,
}

impl InstanceKeys {
    pub fn new(config: &AliveConfig, hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            liveness_key: config.liveness_key.clone(),
            registered_instance_key: config.registered_instance_key.clone(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn liveness(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.liveness_key, self.hostname)
    }

    pub fn registration(&self) -> String {
        registration_key(&self.registered_instance_key, &self.hostname)
    }

    pub fn process_group(&self, pgid: i32) -> String {
        format!(
            "{}_PGRP{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.registered_instance_key, self.hostname, pgid
        )
    }
}

pub fn registration_key(registered_instance_key: &str, hostname: &str) -> String {
    format!("{registered_instance_key}{KEY_SEPARATOR}{hostname}")
}

/// SCAN pattern matching every registration record but none of the `_PGRP` counters.
pub fn registration_pattern(registered_instance_key: &str) -> String {
    format!("{registered_instance_key}{KEY_SEPARATOR}*")
}

/// Hostname part of a registration key, `None` for foreign keys.
pub fn hostname_from_registration_key<'a>(
    registered_instance_key: &str,
    key: &'a str,
) -> Option<&'a str> {
    key.strip_prefix(registered_instance_key)?
        .strip_prefix(KEY_SEPARATOR)
        .filter(|hostname| !hostname.is_empty())
}
