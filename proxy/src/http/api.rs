//! Query endpoints under `/api`.
//!
//! A busy cache answers `503` with `Retry-After`, an unknown channel `404`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::warn;

use adcproxy_common::Quality;

use crate::{
    app::{AppState, ControlRequest},
    cache::ChannelData,
    engine::describe,
    facade::{Lookup, PairData, StatusSnapshot},
};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/discover", post(rediscover))
        .route("/channels/{channel}/data", get(channel_data))
        .route("/channels/{channel}/pair", get(channel_pair))
        .route("/channels/{channel}/info", get(channel_info))
        .route("/channels/{channel}/properties", get(channel_properties))
        .route("/status", get(status))
        .route("/shot_id", get(shot_id))
        .route("/elapsed", get(elapsed))
}

/// Cached data of one channel as served to clients.
#[derive(Debug, Serialize)]
struct ChannelDataBody {
    channel: String,
    values: Vec<f64>,
    quality: Quality,
    average: usize,
    cycle: u64,
    shot_id: i64,
}

impl ChannelDataBody {
    fn new(channel: &str, data: &ChannelData) -> Self {
        Self {
            channel: channel.to_string(),
            values: data.values.to_vec(),
            quality: data.quality,
            average: data.average,
            cycle: data.cycle,
            shot_id: data.shot_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct PairBody {
    primary: ChannelDataBody,
    companion: ChannelDataBody,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    device: String,
    #[serde(flatten)]
    snapshot: StatusSnapshot,
}

/// Map the two sentinels to their status codes and `Ready` through `ready`.
fn respond<T>(lookup: Lookup<T>, channel: &str, ready: impl FnOnce(T) -> Response) -> Response {
    match lookup {
        Lookup::Ready(value) => ready(value),
        Lookup::Busy => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(RETRY_AFTER, "1")],
            "Refresh in progress, retry shortly",
        )
            .into_response(),
        Lookup::NotFound => {
            (StatusCode::NOT_FOUND, format!("Channel '{channel}' not found")).into_response()
        }
    }
}

async fn list_channels(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.facade.channel_list())
}

/// Ask the scheduler to re-run discovery and wait for the new selection.
#[axum::debug_handler]
async fn rediscover(State(state): State<AppState>) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();
    if state
        .control_tx
        .send(ControlRequest::Rediscover { reply: reply_tx })
        .await
        .is_err()
    {
        return (StatusCode::SERVICE_UNAVAILABLE, "Scheduler is not running").into_response();
    }
    match reply_rx.await {
        Ok(Ok(selection)) => Json(selection).into_response(),
        Ok(Err(e)) => {
            let message = describe(&e);
            warn!("Requested rediscovery failed: {message}");
            (StatusCode::BAD_GATEWAY, message).into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Scheduler stopped").into_response(),
    }
}

async fn channel_data(Path(channel): Path<String>, State(state): State<AppState>) -> Response {
    respond(state.facade.channel_data(&channel), &channel, |data| {
        Json(ChannelDataBody::new(&channel, &data)).into_response()
    })
}

async fn channel_pair(Path(channel): Path<String>, State(state): State<AppState>) -> Response {
    let companion = state
        .config
        .naming()
        .companion_of(&channel)
        .unwrap_or_default();
    respond(
        state.facade.channel_pair(&channel),
        &channel,
        |PairData { primary, companion: companion_data }| {
            Json(PairBody {
                primary: ChannelDataBody::new(&channel, &primary),
                companion: ChannelDataBody::new(&companion, &companion_data),
            })
            .into_response()
        },
    )
}

async fn channel_info(Path(channel): Path<String>, State(state): State<AppState>) -> Response {
    respond(state.facade.channel_info(&channel), &channel, IntoResponse::into_response)
}

async fn channel_properties(
    Path(channel): Path<String>,
    State(state): State<AppState>,
) -> Response {
    respond(
        state.facade.channel_properties(&channel),
        &channel,
        IntoResponse::into_response,
    )
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusBody {
        device: state.config.source.device.clone(),
        snapshot: state.facade.status(),
    })
}

async fn shot_id(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.facade.shot_id())
}

async fn elapsed(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.facade.elapsed())
}
