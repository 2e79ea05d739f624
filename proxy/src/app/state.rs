use alloc::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::{config::ProxyConfig, facade::ReadFacade, registry::DiscoveryError};

/// Requests handled by the scheduler between two ticks.
#[derive(Debug)]
pub(crate) enum ControlRequest {
    /// Re-run channel discovery and reply with the new selection.
    Rediscover {
        reply: oneshot::Sender<Result<Vec<String>, DiscoveryError>>,
    },
}

pub(crate) type ControlTx = mpsc::Sender<ControlRequest>;
pub(crate) type ControlRx = mpsc::Receiver<ControlRequest>;

/// Application state shared across request handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Read access to the cache.
    pub facade: ReadFacade,

    /// Sender for requests to the scheduler, which owns the refresh engine.
    pub control_tx: ControlTx,

    /// The configuration the proxy was started with.
    pub config: Arc<ProxyConfig>,
}
