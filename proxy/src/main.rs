//! Proxy entrypoint for the `adcproxy_server` binary.

use clap::Parser as _;

use adcproxy_server::{cli::Cli, inner_main};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    inner_main(Cli::parse()).await
}
