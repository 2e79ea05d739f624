//! Command-line interface definitions for the proxy.

use std::env;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands for the proxy.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the caching proxy and its HTTP query API.
    Serve(ServiceArgs),

    /// Discover the channels of the configured device once and print them.
    ListChannels {
        /// Path to the configuration file
        #[arg(short, long, default_value = "adcproxy.toml")]
        config: String,
    },
}

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
    Pretty,
}

/// Arguments for the serve command.
#[derive(Debug, Parser)]
pub struct ServiceArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "adcproxy.toml")]
    pub config: String,

    /// Optional override for the listen port (overrides port in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides bind in config)
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(long, value_enum, default_value_t, env = "ADCPROXY_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_parses_overrides() {
        let cli = Cli::parse_from([
            "adcproxy",
            "serve",
            "--config",
            "proxy.toml",
            "--port",
            "9000",
            "--log-format",
            "json",
        ]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve")
        };
        assert_eq!(args.config, "proxy.toml");
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.bind, None);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn list_channels_defaults_config_path() {
        let cli = Cli::parse_from(["adcproxy", "list-channels"]);
        assert!(
            matches!(cli.command, Command::ListChannels { ref config } if config == "adcproxy.toml"),
            "unexpected {:?}",
            cli.command
        );
    }
}
