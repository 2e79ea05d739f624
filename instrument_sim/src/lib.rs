//! Library entry for the `instrument_sim` crate.
//!
//! A simulated ADC instrument behind an HTTP gateway, for development and the
//! integration tests of the proxy.

extern crate alloc;
extern crate core;

pub mod device;
pub mod server;

use std::{env, sync::Once};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use server::ServiceOptions;

/// Top-level CLI parser for the simulator.
#[derive(Debug, Parser)]
#[command(name = "instrument_sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(about = "Simulated ADC instrument speaking the gateway protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands available for the simulator.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a simulated device until stopped.
    Serve(ServiceOptions),
}

static INIT_TRACING: Once = Once::new();

/// The simulator's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub async fn inner_main(invocation: Cli) -> eyre::Result<()> {
    INIT_TRACING.call_once(|| {
        let default_level = if env::var("ADCPROXY_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            "info"
        };
        // Fails only if the embedding process already installed a subscriber.
        drop(
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .with_timer(ChronoLocal::rfc_3339())
                .compact()
                .try_init(),
        );
    });

    match invocation.command {
        Command::Serve(options) => server::start_simulator(options).await,
    }
}
