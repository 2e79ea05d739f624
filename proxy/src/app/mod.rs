mod runtime;
mod startup;
mod state;

pub(crate) use runtime::spawn_scheduler;
pub(crate) use startup::{list_channels, shutdown_signal, start};
pub(crate) use state::{AppState, ControlRequest, ControlTx};
