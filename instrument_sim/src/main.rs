//! Entrypoint for the `instrument_sim` binary.

use clap::Parser as _;

use adcproxy_sim::{Cli, inner_main};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    inner_main(Cli::parse()).await
}
