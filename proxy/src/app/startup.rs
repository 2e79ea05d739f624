//! Wiring of the proxy: config, remote client, engine, scheduler and HTTP server.

use alloc::sync::Arc;
use core::net::{IpAddr, SocketAddr};
use std::{
    io::{self, Write as _},
    path::Path,
    string,
};

use eyre::WrapErr as _;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use super::{runtime::spawn_scheduler, state::AppState};
use crate::{
    cache::{CacheStore, ConcurrencyGuard},
    config::{ProxyConfig, load},
    engine::{RefreshEngine, describe},
    facade::ReadFacade,
    http::start_server,
    registry::discover,
    remote::HttpSource,
};

/// Resolves on SIGTERM or Ctrl-C.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    res = signal::ctrl_c() => drop(res),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

fn source_for(config: &ProxyConfig) -> eyre::Result<HttpSource> {
    HttpSource::new(&config.source.gateway, &config.source.device)
        .wrap_err("Invalid [source] configuration")
}

/// Load the config, start the refresh scheduler and serve the query API.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the listener cannot be bound.
/// An unreachable remote device is not an error: the proxy starts faulted and recovers.
pub(crate) async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    let config = load(config_path).await?;

    // Apply optional overrides from CLI/tests
    let listen_port = port_override.unwrap_or(config.server.port);
    let bind_str = bind_override.map_or_else(
        || config.server.bind.clone(),
        string::ToString::to_string,
    );
    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    let source = source_for(&config)?;
    info!(device = source.device(), gateway = %config.source.gateway, "Using remote device");

    let cache = ConcurrencyGuard::new(CacheStore::new(config.naming()));
    let mut engine = RefreshEngine::new(source, cache.clone(), config.refresh_settings());
    if let Err(e) = engine.initialize().await {
        error!(
            "Initial discovery failed, retrying on the next tick: {}",
            describe(&e)
        );
    }

    let (control_tx, control_rx) = mpsc::channel(8);
    spawn_scheduler(engine, config.tick_interval(), control_rx);

    let app_state = AppState {
        facade: ReadFacade::new(cache),
        control_tx,
        config: Arc::new(config),
    };
    start_server(app_state, SocketAddr::from((listen_ip, listen_port))).await
}

/// Run one discovery against the configured device and print the selected channels.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or discovery fails.
pub(crate) async fn list_channels(config_path: &Path) -> eyre::Result<()> {
    let config = load(config_path).await?;
    let source = source_for(&config)?;
    let discovery = discover(&source, &config.naming(), config.remote_timeout())
        .await
        .wrap_err(format!("Discovery on '{}' failed", config.source.device))?;

    let naming = config.naming();
    let mut stdout = io::stdout().lock();
    for primary in &discovery.selection {
        let companion = naming.companion_of(primary).unwrap_or_default();
        writeln!(stdout, "{primary}\t{companion}")?;
    }
    Ok(())
}
