//! Gateway server: exposes the simulated device over the JSON gateway protocol.

use alloc::sync::Arc;
use core::{net::SocketAddr, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use eyre::WrapErr as _;
use parking_lot::Mutex;
use tokio::{
    net,
    time::{MissedTickBehavior, interval},
};
use tracing::{Instrument as _, debug, info};

use adcproxy_common::NamesRequest;

use crate::device::{DeviceOptions, SimulatedDevice};

/// Configuration options for running the simulated instrument.
#[derive(Debug, Parser, Clone)]
pub struct ServiceOptions {
    /// TCP port to listen on for gateway requests.
    #[arg(long = "port", default_value_t = 10000)]
    pub port: u16,

    /// Bind address for the listener.
    #[arg(long = "bind", default_value = "127.0.0.1")]
    pub bind: String,

    /// Device path served by this gateway.
    #[arg(long = "device", default_value = "binp/nbi/adc0")]
    pub device: String,

    /// Number of primary/companion channel pairs.
    #[arg(long = "channels", default_value_t = 4)]
    pub channels: u32,

    /// Samples per spectrum.
    #[arg(long = "samples", default_value_t = 64)]
    pub samples: u32,

    /// Fire a shot every this many milliseconds; 0 only fires on request.
    #[arg(long = "shot-period-ms", default_value_t = 0)]
    pub shot_period_ms: u64,
}

#[derive(Clone)]
struct SimState {
    device_path: Arc<str>,
    device: Arc<Mutex<SimulatedDevice>>,
}

type Failure = (StatusCode, String);

impl SimState {
    /// Run `f` on the device if `device_path` names it and failure injection is off.
    fn with_device<R>(
        &self,
        device_path: &str,
        f: impl FnOnce(&SimulatedDevice) -> R,
    ) -> Result<R, Failure> {
        if device_path != &*self.device_path {
            return Err((
                StatusCode::NOT_FOUND,
                format!("Unknown device '{device_path}'"),
            ));
        }
        let device = self.device.lock();
        if device.is_failing() {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Injected failure".to_string(),
            ));
        }
        Ok(f(&device))
    }
}

fn router(state: SimState) -> Router {
    Router::new()
        .route("/devices/{device}/attributes", get(list_attributes))
        .route("/devices/{device}/attributes/{name}", get(read_attribute))
        .route(
            "/devices/{device}/attribute_properties",
            post(attribute_properties),
        )
        .route("/devices/{device}/attribute_info", post(attribute_info))
        .route("/control/shot", post(fire_shot))
        .route("/control/arm", post(arm))
        .route("/control/fail", post(toggle_failure))
        .with_state(state)
}

async fn list_attributes(
    Path(device): Path<String>,
    State(state): State<SimState>,
) -> Result<Response, Failure> {
    state
        .with_device(&device, |d| Json(d.attribute_names()).into_response())
}

async fn read_attribute(
    Path((device, name)): Path<(String, String)>,
    State(state): State<SimState>,
) -> Result<Response, Failure> {
    state
        .with_device(&device, |d| d.read(&name))?
        .map(|reading| Json(reading).into_response())
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("Unknown attribute '{name}'"),
            )
        })
}

async fn attribute_properties(
    Path(device): Path<String>,
    State(state): State<SimState>,
    Json(request): Json<NamesRequest>,
) -> Result<Response, Failure> {
    state.with_device(&device, |d| {
        Json(d.properties(&request.names)).into_response()
    })
}

async fn attribute_info(
    Path(device): Path<String>,
    State(state): State<SimState>,
    Json(request): Json<NamesRequest>,
) -> Result<Response, Failure> {
    state.with_device(&device, |d| Json(d.info(&request.names)).into_response())
}

async fn fire_shot(State(state): State<SimState>) -> impl IntoResponse {
    let shot_id = state.device.lock().fire_shot();
    info!(shot_id, "Shot fired");
    Json(shot_id)
}

async fn arm(State(state): State<SimState>) -> impl IntoResponse {
    state.device.lock().arm();
    info!("Acquisition armed");
    StatusCode::NO_CONTENT
}

async fn toggle_failure(State(state): State<SimState>) -> impl IntoResponse {
    let failing = state.device.lock().toggle_failure();
    info!(failing, "Failure injection toggled");
    Json(failing)
}

/// Fire a shot every `period`.
async fn auto_shots(device: Arc<Mutex<SimulatedDevice>>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let shot_id = device.lock().fire_shot();
        debug!(shot_id, "Automatic shot");
    }
}

/// Serve the simulated device until the process is stopped.
///
/// # Errors
///
/// Returns an error if the bind address is invalid or the listener cannot be bound.
pub async fn start_simulator(options: ServiceOptions) -> eyre::Result<()> {
    let device = Arc::new(Mutex::new(SimulatedDevice::new(DeviceOptions {
        channels: options.channels,
        samples: options.samples,
        ..DeviceOptions::default()
    })));

    if options.shot_period_ms > 0 {
        tokio::spawn(
            auto_shots(
                Arc::clone(&device),
                Duration::from_millis(options.shot_period_ms),
            )
            .in_current_span(),
        );
    }

    let state = SimState {
        device_path: options.device.as_str().into(),
        device,
    };
    let addr: SocketAddr = format!("{}:{}", options.bind, options.port)
        .parse()
        .wrap_err("Invalid bind address")?;
    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind {addr}"))?;
    info!(device = %options.device, "Simulated instrument listening on http://{addr}");
    axum::serve(listener, router(state))
        .await
        .wrap_err("Simulator server failed")
}
