//! The scheduler task driving the refresh engine.

use core::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{Instrument as _, debug, info};

use super::state::{ControlRequest, ControlRx};
use crate::{engine::RefreshEngine, remote::RemoteSource};

/// Spawn the scheduler; it owns `engine` until the control channel closes.
pub(crate) fn spawn_scheduler<S: RemoteSource>(
    engine: RefreshEngine<S>,
    period: Duration,
    control_rx: ControlRx,
) -> JoinHandle<()> {
    tokio::spawn(run_scheduler(engine, period, control_rx).in_current_span())
}

/// Tick the engine and serve control requests in between.
///
/// `period` is the gap between the end of one tick and the start of the next,
/// so a slow refresh never shortens the pause that follows it.
async fn run_scheduler<S: RemoteSource>(
    mut engine: RefreshEngine<S>,
    period: Duration,
    mut control_rx: ControlRx,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis(), "Scheduler started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Failures are logged and recorded on the device by the engine.
                if engine.tick().await.is_err() {
                    debug!("Tick failed, retrying on the next one");
                }
                ticker.reset();
            }
            request = control_rx.recv() => match request {
                Some(ControlRequest::Rediscover { reply }) => {
                    info!("Rediscovery requested");
                    let result = engine.rediscover().await;
                    if reply.send(result).is_err() {
                        debug!("Rediscovery requester went away");
                    }
                }
                None => {
                    info!("Control channel closed, stopping scheduler");
                    break;
                }
            },
        }
    }
}
