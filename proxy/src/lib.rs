//! Library entry for the `adcproxy_server` crate.
//!
//! A caching proxy in front of a slow data-acquisition instrument: it polls the
//! instrument for new shots, pulls and downsamples the enabled channels, and
//! serves the cached data to any number of clients without touching the
//! instrument again.
//!
//! Exposes `inner_main` so a workspace-level shim binary can call into the proxy logic.
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "This is not problematic in tests",)
)]

extern crate alloc;
extern crate core;

pub mod cache;
pub mod cli;
pub mod downsample;
pub mod engine;
pub mod facade;
pub mod registry;
pub mod remote;

mod app;
mod config;
mod http;

use std::{env, fs, sync::Once};

use eyre::{Result, WrapErr as _};
use tracing::{Instrument as _, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();

fn init_tracing(format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("ADCPROXY_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339());

        // Fails only if the embedding process already installed a subscriber.
        let installed = match format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        drop(installed);
    });
}

/// The proxy's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, the server fails to start,
/// or a one-shot command fails.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    match invocation.command {
        Command::Serve(args) => {
            let config = &args.config;
            let config_path =
                fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

            init_tracing(args.log_format);

            // Startup span holding the resolved config path for the initialization phase.
            let startup_span = tracing::info_span!("proxy.startup", ?config_path, pid=?std::process::id(), version = env!("CARGO_PKG_VERSION"));

            async {
                info!("Starting proxy");
                // Pass through optional port/bind overrides from CLI
                app::start(&config_path, args.port, args.bind.as_deref()).await
            }
            .instrument(startup_span)
            .await
        }
        Command::ListChannels { config } => {
            let config_path = fs::canonicalize(&config)
                .wrap_err(format!("Config file not found at: {config}"))?;
            app::list_channels(&config_path).await
        }
    }
}
