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

use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::protocol::CodingMethod;

/// Configuration for an agency.
///
/// Loaded from TOML in XDG-compliant directories. Every section falls back to
/// its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Task scheduling configuration
    pub scheduling: SchedulingConfig,
    /// Remote agency and transport configuration
    pub remote: RemoteConfig,
    /// Default values configuration
    pub defaults: DefaultsConfig,
}

/// Timeout-related configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a remote call may stay pending before it resolves with a timeout
    pub call_timeout_ms: u64,
    /// How long shutdown waits for each actor thread to finish
    pub actor_shutdown_timeout_ms: u64,
    /// Upper bound between re-checks while waiting on a lifecycle gate
    pub state_recheck_ms: u64,
    /// How long a direct capability waits for an actor busy in a queued routine
    pub direct_call_timeout_ms: u64,
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Step interval of the agency's own body, which sweeps expired remote calls
    pub pending_sweep_interval_ms: u64,
}

/// Remote agency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Coding method used for values sent by local transmitters
    pub default_coding: CodingMethod,
    /// Announced schemes that are able to transmit requests
    pub transmitter_schemes: Vec<String>,
    /// Peers silent for longer than this are dropped by `prune_stale`
    pub presence_ttl_ms: u64,
}

/// Default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Agency id used when none is provided
    pub agency_id: String,
    /// Host advertised in object URIs
    pub host: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            actor_shutdown_timeout_ms: 10_000,
            state_recheck_ms: 1_000,
            direct_call_timeout_ms: 5_000,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            pending_sweep_interval_ms: 250,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_coding: CodingMethod::default(),
            transmitter_schemes: vec!["mem".to_string(), "tcp".to_string(), "xml-tcp".to_string()],
            presence_ttl_ms: 60_000,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            agency_id: "agency".to_string(),
            host: "127.0.0.1".to_string(),
        }
    }
}

impl AgencyConfig {
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.call_timeout_ms)
    }

    pub const fn actor_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.actor_shutdown_timeout_ms)
    }

    pub const fn state_recheck(&self) -> Duration {
        Duration::from_millis(self.timeouts.state_recheck_ms)
    }

    pub const fn direct_call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.direct_call_timeout_ms)
    }

    pub const fn pending_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.scheduling.pending_sweep_interval_ms)
    }

    pub const fn presence_ttl(&self) -> Duration {
        Duration::from_millis(self.remote.presence_ttl_ms)
    }

    /// `true` when ports announced under `scheme` can carry requests.
    pub fn is_transmitter_scheme(&self, scheme: &str) -> bool {
        self.remote
            .transmitter_schemes
            .iter()
            .any(|candidate| candidate == scheme)
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `agency/config.toml` under the XDG configuration directories.
    /// If no configuration file is found, returns the default configuration.
    /// If a configuration file exists but is malformed, logs an error and uses defaults.
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("agency") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(config_str) => match Self::from_toml_str(&config_str) {
                Ok(config) => {
                    info!("Successfully loaded configuration");
                    config
                }
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Process-wide configuration loaded from XDG-compliant locations
    pub static ref CONFIG: AgencyConfig = AgencyConfig::load();
}
