//! In-memory holder for the latest shot's channel data.
//!
//! The store has no locking of its own; it is always accessed through
//! [`super::ConcurrencyGuard`].

use alloc::sync::Arc;
use std::collections::HashMap;

use serde::Serialize;

use adcproxy_common::{InfoMap, PropertySet, Quality};

use crate::registry::{ChannelNaming, ChannelRegistry, Discovery};

/// Downsampled data of one channel, tagged with the cycle that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub values: Arc<[f64]>,
    pub quality: Quality,
    /// Block size the raw samples were averaged with.
    pub average: usize,
    /// Refresh cycle that produced these values.
    pub cycle: u64,
    /// Shot the values belong to.
    pub shot_id: i64,
}

/// Lifecycle state of the proxied device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    #[default]
    Init,
    Running,
    Fault,
}

/// Everything one completed refresh cycle produced, ready to be swapped in.
#[derive(Debug, Clone, Default)]
pub struct StagedCycle {
    pub cycle: u64,
    pub shot_id: i64,
    pub data: HashMap<String, ChannelData>,
    pub info: InfoMap,
}

impl StagedCycle {
    #[must_use]
    pub fn new(cycle: u64, shot_id: i64) -> Self {
        Self {
            cycle,
            shot_id,
            ..Self::default()
        }
    }

    /// Stage values for one channel, tagged with this cycle and shot.
    pub fn put(&mut self, channel: &str, values: Vec<f64>, quality: Quality, average: usize) {
        let entry = ChannelData {
            values: values.into(),
            quality,
            average,
            cycle: self.cycle,
            shot_id: self.shot_id,
        };
        self.data.insert(channel.to_string(), entry);
    }
}

/// Latest per-channel data, metadata and properties, plus the refresh bookkeeping.
#[derive(Debug, Default)]
pub struct CacheStore {
    data: HashMap<String, ChannelData>,
    info: InfoMap,
    registry: ChannelRegistry,
    pub last_shot_id: Option<i64>,
    pub last_elapsed: Option<f64>,
    pub refresh_in_progress: bool,
    pub upstream_refresh_in_progress: bool,
    cycle: u64,
    state: DeviceState,
    status: String,
}

impl CacheStore {
    #[must_use]
    pub fn new(naming: ChannelNaming) -> Self {
        Self {
            registry: ChannelRegistry::new(naming),
            status: "Initializing".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&ChannelData> {
        self.data.get(channel)
    }

    #[must_use]
    pub fn info(&self, channel: &str) -> Option<&serde_json::Value> {
        self.info.get(channel)
    }

    #[must_use]
    pub fn properties(&self, channel: &str) -> Option<&PropertySet> {
        self.registry.properties_of(channel)
    }

    #[must_use]
    pub const fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn install_discovery(&mut self, discovery: Discovery) {
        self.registry.install(discovery);
    }

    /// Swap in a staged cycle as a whole.
    ///
    /// Entries for channels the cycle did not touch are kept.
    pub fn install_cycle(&mut self, staged: StagedCycle) {
        self.data.extend(staged.data);
        self.info.extend(staged.info);
        self.cycle = staged.cycle;
        self.last_shot_id = Some(staged.shot_id);
    }

    /// Number of the last completed refresh cycle; 0 before the first one.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Whether readers should be told to come back later.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.refresh_in_progress || self.upstream_refresh_in_progress
    }

    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_running(&mut self, status: impl Into<String>) {
        self.state = DeviceState::Running;
        self.status = status.into();
    }

    pub fn set_fault(&mut self, status: impl Into<String>) {
        self.state = DeviceState::Fault;
        self.status = status.into();
    }
}
