//! Configuration data types for the proxy.
//!
//! Every section except `[source]` may be omitted and falls back to defaults.

use core::time::Duration;

use serde::Deserialize;

use adcproxy_common::routes::{DEFAULT_ELAPSED_ATTRIBUTE, DEFAULT_SHOT_ATTRIBUTE};

use crate::{engine::RefreshSettings, registry::ChannelNaming};

/// HTTP server binding configuration section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct ServerConfig {
    /// TCP port for the query API.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// The remote device and how to reach it.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct SourceConfig {
    /// Device path on the gateway, e.g. `binp/nbi/adc0`.
    pub device: String,
    /// Base URL of the instrument gateway.
    #[serde(default = "default_gateway")]
    pub gateway: String,
    /// Per remote call timeout in milliseconds; 0 disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct RefreshConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_shot_attribute")]
    pub shot_attribute: String,
    #[serde(default = "default_elapsed_attribute")]
    pub elapsed_attribute: String,
    /// Refresh on the baseline observation too.
    #[serde(default)]
    pub prime_on_start: bool,
    #[serde(default)]
    pub rediscover_each_shot: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            shot_attribute: default_shot_attribute(),
            elapsed_attribute: default_elapsed_attribute(),
            prime_on_start: false,
            rediscover_each_shot: false,
        }
    }
}

/// Channel selection and pairing.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct ChannelsConfig {
    #[serde(default = "default_primary_prefix")]
    pub primary_prefix: String,
    #[serde(default = "default_companion_prefix")]
    pub companion_prefix: String,
    /// Property holding the average block size of a channel.
    #[serde(default = "default_average_property")]
    pub average_property: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            primary_prefix: default_primary_prefix(),
            companion_prefix: default_companion_prefix(),
            average_property: default_average_property(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway() -> String {
    "http://127.0.0.1:10000".to_string()
}

const fn default_timeout_ms() -> u64 {
    5000
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_shot_attribute() -> String {
    DEFAULT_SHOT_ATTRIBUTE.to_string()
}

fn default_elapsed_attribute() -> String {
    DEFAULT_ELAPSED_ATTRIBUTE.to_string()
}

fn default_primary_prefix() -> String {
    "chany".to_string()
}

fn default_companion_prefix() -> String {
    "chanx".to_string()
}

fn default_average_property() -> String {
    "save_avg".to_string()
}

/// Root config structure of the proxy.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl ProxyConfig {
    /// Timeout applied to each remote call, if any.
    pub const fn remote_timeout(&self) -> Option<Duration> {
        match self.source.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Period between two CHECKING steps; never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.refresh.tick_interval_ms.max(1))
    }

    pub fn naming(&self) -> ChannelNaming {
        ChannelNaming {
            primary_prefix: self.channels.primary_prefix.clone(),
            companion_prefix: self.channels.companion_prefix.clone(),
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            shot_attribute: self.refresh.shot_attribute.clone(),
            elapsed_attribute: self.refresh.elapsed_attribute.clone(),
            average_property: self.channels.average_property.clone(),
            remote_timeout: self.remote_timeout(),
            prime_on_start: self.refresh.prime_on_start,
            rediscover_each_shot: self.refresh.rediscover_each_shot,
        }
    }
}
