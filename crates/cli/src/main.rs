use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
use commands::{handle_config_command, query, ConfigCommands};

#[derive(Parser)]
#[command(name = "waypoint-cli")]
#[command(about = "Waypoint CLI - inspect and exercise the multi-endpoint data-access layer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, global = true, env = "WAYPOINT_CONFIG", default_value = "config/config.toml")]
    config: String,

    /// Log progress of attempts and probes to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every endpoint once and print the health snapshot
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute one GET request against a service
    Fetch {
        /// Logical service name
        service: String,

        /// Request path, e.g. /blocks/latest
        path: String,
    },

    /// Race a dual-source pair and print the first usable answer
    Resolve {
        /// Configured pair name
        pair: String,

        /// Request path sent to both sources
        path: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warn,waypoint_core=debug,cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Status { json } => {
            query::status(&cli.config, json).await.context("status failed")?;
        }
        Commands::Fetch { service, path } => {
            query::fetch(&cli.config, &service, &path)
                .await
                .with_context(|| format!("fetch {service}{path} failed"))?;
        }
        Commands::Resolve { pair, path } => {
            query::resolve(&cli.config, &pair, &path)
                .await
                .with_context(|| format!("resolve {pair}{path} failed"))?;
        }
        Commands::Config(config_command) => {
            handle_config_command(config_command, &cli.config)?;
        }
    }

    Ok(())
}
