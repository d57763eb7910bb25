/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Runtime configuration.
//!
//! Values are read from `$XDG_CONFIG_HOME/courier/config.toml`. Every field has a
//! default, so a partial file only overrides what it names, and a missing or malformed
//! file yields [`CourierConfig::default`].

use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::actor::RestartLimiterConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Timeouts and intervals.
    pub timeouts: TimeoutConfig,
    /// Capacities.
    pub limits: LimitsConfig,
    /// Remoting.
    pub remote: RemoteConfig,
    /// Default names.
    pub defaults: DefaultsConfig,
    /// Default restart limiter for supervisors.
    pub supervision: RestartLimiterConfig,
}

/// Timeouts, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a parent waits for each child to stop.
    pub actor_shutdown_ms: u64,
    /// How long `shutdown_all` waits for every root actor.
    pub system_shutdown_ms: u64,
    /// How long `ensure_connected` waits on the endpoint supervisor.
    pub endpoint_request_ms: u64,
    /// Delay between removing a routee and poison-pilling it.
    pub routee_grace_ms: u64,
    /// Polling interval of a suspended endpoint reader.
    pub reader_suspend_backoff_ms: u64,
    /// Default timeout of request futures.
    pub request_future_ms: u64,
}

/// Capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bound of each actor's user inbox.
    pub actor_inbox_capacity: usize,
    /// Initial capacity of the endpoint reader's pid lookup buffer.
    pub reader_target_buffer: usize,
    /// Bound of the in-memory transport's per-connection channel.
    pub transport_channel_capacity: usize,
}

/// Remoting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Serializer id offered to peers on connect and used for outbound messages.
    pub default_serializer_id: i32,
}

/// Default names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Name used in logs for unnamed actors.
    pub actor_name: String,
    /// Registry name of the endpoint supervisor.
    pub endpoint_supervisor_name: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            actor_shutdown_ms: 10_000,
            system_shutdown_ms: 30_000,
            endpoint_request_ms: 5_000,
            routee_grace_ms: 1,
            reader_suspend_backoff_ms: 500,
            request_future_ms: 5_000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            actor_inbox_capacity: 255,
            reader_target_buffer: 100,
            transport_channel_capacity: 64,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_serializer_id: 0,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            actor_name: "actor".to_string(),
            endpoint_supervisor_name: "endpoint_supervisor".to_string(),
        }
    }
}

impl CourierConfig {
    /// Per-child stop timeout.
    pub const fn actor_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.actor_shutdown_ms)
    }

    /// Whole-system stop timeout.
    pub const fn system_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.system_shutdown_ms)
    }

    /// Endpoint construction timeout.
    pub const fn endpoint_request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.endpoint_request_ms)
    }

    /// Router removal grace interval.
    pub const fn routee_grace(&self) -> Duration {
        Duration::from_millis(self.timeouts.routee_grace_ms)
    }

    /// Suspended reader polling interval.
    pub const fn reader_suspend_backoff(&self) -> Duration {
        Duration::from_millis(self.timeouts.reader_suspend_backoff_ms)
    }

    /// Default request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_future_ms)
    }

    /// Loads the configuration from the XDG config directory.
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("courier") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        match xdg_dirs.find_config_file("config.toml") {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// Loads the configuration from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        info!("Loading configuration from: {}", path.display());
        let config_str = match std::fs::read_to_string(path) {
            Ok(config_str) => config_str,
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<Self>(&config_str) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Failed to parse configuration file {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Configuration loaded once per process.
    pub static ref CONFIG: CourierConfig = CourierConfig::load();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CourierConfig::default();
        assert_eq!(config.timeouts.reader_suspend_backoff_ms, 500);
        assert_eq!(config.timeouts.routee_grace_ms, 1);
        assert_eq!(config.limits.actor_inbox_capacity, 255);
        assert_eq!(config.remote.default_serializer_id, 0);
        assert_eq!(config.defaults.endpoint_supervisor_name, "endpoint_supervisor");
        assert_eq!(config.supervision, RestartLimiterConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: CourierConfig = toml::from_str(
            r#"
            [timeouts]
            endpoint_request_ms = 250

            [supervision]
            max_restarts = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint_request_timeout(), Duration::from_millis(250));
        assert_eq!(config.timeouts.system_shutdown_ms, 30_000);
        assert_eq!(config.supervision.max_restarts, 2);
        assert_eq!(config.supervision.window_ms, 10_000);
    }
}
