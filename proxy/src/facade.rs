//! Read-only queries served to clients.
//!
//! Every query answers immediately: while a refresh is in flight data and info
//! lookups report [`Lookup::Busy`] instead of waiting on the remote.

use serde::Serialize;

use crate::cache::{CacheStore, ChannelData, ConcurrencyGuard, DeviceState};

/// Outcome of a cache query.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Ready(T),
    /// A refresh is in progress locally or upstream; ask again shortly.
    Busy,
    NotFound,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Ready(value) => Lookup::Ready(f(value)),
            Self::Busy => Lookup::Busy,
            Self::NotFound => Lookup::NotFound,
        }
    }

    fn from_busy(store: &CacheStore, value: Option<T>) -> Self {
        if store.is_busy() {
            Self::Busy
        } else {
            value.map_or(Self::NotFound, Self::Ready)
        }
    }
}

/// A primary channel and its companion, taken from the same refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PairData {
    pub primary: ChannelData,
    pub companion: ChannelData,
}

/// Polled scalars and flags of the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: DeviceState,
    pub status: String,
    pub last_shot_id: Option<i64>,
    pub last_elapsed: Option<f64>,
    pub refresh_in_progress: bool,
    pub upstream_refresh_in_progress: bool,
    pub cycle: u64,
}

#[derive(Clone)]
pub struct ReadFacade {
    cache: ConcurrencyGuard,
}

impl ReadFacade {
    #[must_use]
    pub const fn new(cache: ConcurrencyGuard) -> Self {
        Self { cache }
    }

    /// Run several queries against one consistent view of the cache.
    pub fn snapshot<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.cache.exclusive(|| f(self))
    }

    #[must_use]
    pub fn channel_data(&self, channel: &str) -> Lookup<ChannelData> {
        self.cache
            .read(|store| Lookup::from_busy(store, store.get(channel).cloned()))
    }

    /// Data of a primary channel together with its companion.
    #[must_use]
    pub fn channel_pair(&self, primary: &str) -> Lookup<PairData> {
        let Some(companion) = self
            .cache
            .read(|store| store.registry().naming().companion_of(primary))
        else {
            return Lookup::NotFound;
        };
        self.snapshot(|facade| {
            match (facade.channel_data(primary), facade.channel_data(&companion)) {
                (Lookup::Ready(primary), Lookup::Ready(companion)) => {
                    Lookup::Ready(PairData { primary, companion })
                }
                (Lookup::Busy, _) | (_, Lookup::Busy) => Lookup::Busy,
                _ => Lookup::NotFound,
            }
        })
    }

    /// Cached remote metadata, rendered as JSON text.
    #[must_use]
    pub fn channel_info(&self, channel: &str) -> Lookup<String> {
        self.cache.read(|store| {
            Lookup::from_busy(store, store.info(channel).map(ToString::to_string))
        })
    }

    /// Declared properties, rendered as JSON text. Served even during a refresh.
    #[must_use]
    pub fn channel_properties(&self, channel: &str) -> Lookup<String> {
        self.cache.read(|store| {
            store
                .properties(channel)
                .and_then(|set| serde_json::to_string(set).ok())
                .map_or(Lookup::NotFound, Lookup::Ready)
        })
    }

    /// Currently selected primary channels.
    #[must_use]
    pub fn channel_list(&self) -> Vec<String> {
        self.cache
            .read(|store| store.registry().selection().to_vec())
    }

    #[must_use]
    pub fn shot_id(&self) -> Option<i64> {
        self.cache.read(|store| store.last_shot_id)
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.cache.read(|store| store.last_elapsed)
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.cache.read(|store| StatusSnapshot {
            state: store.state(),
            status: store.status().to_string(),
            last_shot_id: store.last_shot_id,
            last_elapsed: store.last_elapsed,
            refresh_in_progress: store.refresh_in_progress,
            upstream_refresh_in_progress: store.upstream_refresh_in_progress,
            cycle: store.cycle(),
        })
    }
}
