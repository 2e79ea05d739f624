//! The refresh state machine.
//!
//! Every tick reads the remote shot identifier and elapsed time, decides
//! whether a new shot is available and, if so, pulls every enabled channel
//! pair, downsamples it and swaps the whole result into the cache at once.
//!
//! A cycle is staged outside the lock and published in one guarded section,
//! so a failed cycle leaves the previous one untouched.

use core::{error, time::Duration};

use thiserror::Error as ThisError;
use tracing::{debug, error, info, warn};

use adcproxy_common::routes::{DEFAULT_ELAPSED_ATTRIBUTE, DEFAULT_SHOT_ATTRIBUTE};

use crate::{
    cache::{ConcurrencyGuard, DeviceState, StagedCycle},
    downsample::{DownsampleError, block_size_from, reduce},
    registry::{DiscoveryError, discover},
    remote::{RemoteError, RemoteSource, with_timeout},
};

/// Tunables of the refresh engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub shot_attribute: String,
    pub elapsed_attribute: String,
    /// Per-channel property holding the average block size.
    pub average_property: String,
    /// Upper bound for a single remote call; `None` waits forever.
    pub remote_timeout: Option<Duration>,
    /// Refresh on the very first observation instead of only recording it.
    pub prime_on_start: bool,
    /// Re-run channel discovery before every refresh cycle.
    pub rediscover_each_shot: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            shot_attribute: DEFAULT_SHOT_ATTRIBUTE.to_string(),
            elapsed_attribute: DEFAULT_ELAPSED_ATTRIBUTE.to_string(),
            average_property: "save_avg".to_string(),
            remote_timeout: Some(Duration::from_secs(5)),
            prime_on_start: false,
            rediscover_each_shot: false,
        }
    }
}

/// Where the engine currently is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    Refreshing,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// First observation; recorded without refreshing.
    Baseline { shot_id: i64 },
    /// Nothing new upstream.
    Unchanged,
    /// Elapsed time went backwards: the instrument started a new acquisition.
    UpstreamBusy,
    /// The instrument is still acquiring; waiting for the shot id to change.
    Suppressed,
    /// A new shot was pulled into the cache.
    Refreshed {
        shot_id: i64,
        cycle: u64,
        channels: usize,
    },
}

/// Failure of a tick. The cache keeps the last completed cycle.
#[derive(Debug, ThisError)]
pub enum RefreshError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to read '{attribute}'")]
    ReadScalar {
        attribute: String,
        #[source]
        source: RemoteError,
    },
    #[error("shot id {0} is not an integer")]
    InvalidShotId(f64),
    #[error("failed to read channel '{channel}'")]
    ReadChannel {
        channel: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to read channel metadata")]
    Metadata(#[source] RemoteError),
}

/// Render an error together with its chain of causes.
pub(crate) fn describe(err: &dyn error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

enum Decision {
    Baseline,
    Refresh,
    UpstreamBusy,
    Suppressed,
    Unchanged,
}

/// Polls a [`RemoteSource`] and publishes new shots into the cache.
pub struct RefreshEngine<S> {
    source: S,
    cache: ConcurrencyGuard,
    settings: RefreshSettings,
    phase: Phase,
}

impl<S: RemoteSource> RefreshEngine<S> {
    pub const fn new(source: S, cache: ConcurrencyGuard, settings: RefreshSettings) -> Self {
        Self {
            source,
            cache,
            settings,
            phase: Phase::Idle,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn cache(&self) -> &ConcurrencyGuard {
        &self.cache
    }

    /// First discovery at startup.
    ///
    /// # Errors
    ///
    /// Returns the discovery failure; the device is then left in the fault
    /// state and the next tick retries.
    pub async fn initialize(&mut self) -> Result<(), RefreshError> {
        self.rediscover().await?;
        self.cache
            .write(|store| store.set_running("Initialization completed"));
        Ok(())
    }

    /// Re-run channel discovery and install the result.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`]; the previous selection is kept.
    pub async fn rediscover(&mut self) -> Result<Vec<String>, DiscoveryError> {
        let naming = self.cache.read(|store| store.registry().naming().clone());
        match discover(&self.source, &naming, self.settings.remote_timeout).await {
            Ok(discovery) => {
                let selection = discovery.selection.clone();
                self.cache.write(|store| store.install_discovery(discovery));
                Ok(selection)
            }
            Err(e) => {
                let status = format!("Discovery failed: {}", describe(&e));
                self.cache.write(|store| store.set_fault(status));
                Err(e)
            }
        }
    }

    /// Run one CHECKING step and, when a new shot is available, a full refresh.
    ///
    /// # Errors
    ///
    /// Returns the first remote failure; the device is marked faulted and the
    /// next tick starts over.
    pub async fn tick(&mut self) -> Result<TickOutcome, RefreshError> {
        self.phase = Phase::Checking;
        let outcome = self.check().await;
        self.phase = Phase::Idle;
        match outcome {
            Ok(ref outcome) => {
                debug!(?outcome, "Tick completed");
                self.cache.write(|store| {
                    if store.state() != DeviceState::Running {
                        store.set_running("Waiting for the next shot");
                    }
                });
            }
            Err(ref e) => {
                let status = describe(e);
                error!("Refresh failed: {status}");
                self.cache.write(|store| store.set_fault(status));
            }
        }
        outcome
    }

    async fn check(&mut self) -> Result<TickOutcome, RefreshError> {
        let needs_discovery = self.cache.read(|store| {
            let registry = store.registry();
            !registry.is_discovered() || registry.selection().is_empty()
        });
        if needs_discovery {
            info!("No channels selected yet, retrying discovery");
            self.rediscover().await?;
        }

        let shot_id = shot_id_from(self.read_scalar(&self.settings.shot_attribute).await?)?;
        let elapsed = self.read_scalar(&self.settings.elapsed_attribute).await?;

        let decision = self.cache.write(|store| {
            let previous_elapsed = store.last_elapsed.replace(elapsed);
            match store.last_shot_id {
                None => Decision::Baseline,
                Some(last) if last != shot_id => {
                    if store.upstream_refresh_in_progress {
                        info!(shot_id, "Upstream acquisition finished");
                        store.upstream_refresh_in_progress = false;
                    }
                    Decision::Refresh
                }
                Some(_) if previous_elapsed.is_some_and(|previous| elapsed < previous) => {
                    store.upstream_refresh_in_progress = true;
                    Decision::UpstreamBusy
                }
                Some(_) if store.upstream_refresh_in_progress => Decision::Suppressed,
                Some(_) => Decision::Unchanged,
            }
        });

        match decision {
            Decision::Baseline if self.settings.prime_on_start => self.refresh(shot_id).await,
            Decision::Baseline => {
                self.cache.write(|store| store.last_shot_id = Some(shot_id));
                info!(shot_id, "Recorded baseline shot");
                Ok(TickOutcome::Baseline { shot_id })
            }
            Decision::Refresh => self.refresh(shot_id).await,
            Decision::UpstreamBusy => {
                info!(elapsed, "Elapsed time went backwards, upstream acquisition in progress");
                Ok(TickOutcome::UpstreamBusy)
            }
            Decision::Suppressed => Ok(TickOutcome::Suppressed),
            Decision::Unchanged => Ok(TickOutcome::Unchanged),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn refresh(&mut self, shot_id: i64) -> Result<TickOutcome, RefreshError> {
        self.phase = Phase::Refreshing;
        self.cache.write(|store| store.refresh_in_progress = true);

        let staged = self.stage(shot_id).await;

        let cache = &self.cache;
        cache.exclusive(|| {
            let outcome = staged.map(|staged| {
                let cycle = staged.cycle;
                let channels = staged.data.len();
                cache.write(|store| {
                    store.install_cycle(staged);
                    store.set_running(format!("Shot {shot_id} cached"));
                });
                info!(cycle, channels, "Refresh cycle completed");
                TickOutcome::Refreshed {
                    shot_id,
                    cycle,
                    channels,
                }
            });
            cache.write(|store| store.refresh_in_progress = false);
            outcome
        })
    }

    /// Pull and downsample every selected pair, without touching the cache.
    async fn stage(&mut self, shot_id: i64) -> Result<StagedCycle, RefreshError> {
        if self.settings.rediscover_each_shot {
            self.rediscover().await?;
        }
        let (pairs, properties, cycle) = self.cache.read(|store| {
            (
                store.registry().pairs(),
                store.registry().properties(),
                store.cycle() + 1,
            )
        });
        let limit = self.settings.remote_timeout;
        let mut staged = StagedCycle::new(cycle, shot_id);
        let mut names = Vec::with_capacity(pairs.len() * 2);

        for pair in pairs {
            // The companion is averaged like its primary so both stay the same length.
            let average = block_size_from(
                properties
                    .get(&pair.primary)
                    .and_then(|props| props.get(&self.settings.average_property))
                    .and_then(|values| values.first())
                    .map(String::as_str),
            );
            for channel in [&pair.primary, &pair.companion] {
                let reading = with_timeout(
                    "read_attribute",
                    limit,
                    self.source.read_attribute(channel),
                )
                .await
                .map_err(|source| RefreshError::ReadChannel {
                    channel: channel.clone(),
                    source,
                })?;
                let quality = reading.quality;
                let values = match reduce(&reading.value.into_samples(), average) {
                    Ok(values) => values,
                    Err(DownsampleError::EmptyInput) => {
                        warn!(%channel, "Channel returned no samples, caching it empty");
                        Vec::new()
                    }
                };
                debug!(%channel, samples = values.len(), average, ?quality, "Staged channel");
                staged.put(channel, values, quality, average.get());
            }
            names.push(pair.primary);
            names.push(pair.companion);
        }

        if names.is_empty() {
            warn!("No channels selected, nothing to cache");
        } else {
            staged.info = with_timeout(
                "attribute_metadata",
                limit,
                self.source.attribute_metadata(&names),
            )
            .await
            .map_err(RefreshError::Metadata)?;
        }
        Ok(staged)
    }

    async fn read_scalar(&self, attribute: &str) -> Result<f64, RefreshError> {
        with_timeout(
            "read_scalar",
            self.settings.remote_timeout,
            self.source.read_scalar(attribute),
        )
        .await
        .map_err(|source| RefreshError::ReadScalar {
            attribute: attribute.to_string(),
            source,
        })
    }
}

/// Shot ids travel as floating point scalars; accept only exact integers.
fn shot_id_from(value: f64) -> Result<i64, RefreshError> {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.is_finite() && value.fract() == 0.0 && value.abs() < LIMIT {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "checked to be an integer below 2^53"
        )]
        Ok(value as i64)
    } else {
        Err(RefreshError::InvalidShotId(value))
    }
}
