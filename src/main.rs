pub mod config;
pub mod error;
pub mod presence;
pub mod snapshot;
pub mod state;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use config::PresenceConfig;
use presence::{ActiveSet, NewClientPolicy};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Reports which Wi-Fi clients are currently connected, based on consecutive airodump-ng CSV
/// exports.
///
/// A client counts as connected if its last seen time changed since the previous run.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Sets the logging verbosity.
    ///
    /// Can be: `trace`, `debug`, `info`, `warn`, `error`. Per-module directives can also be used,
    /// for example: `warn,station_presence=debug`. Ignored when `--verbose` is set.
    #[arg(short = 'L', long, env, default_value = "WARN")]
    log_level: String,
    /// Configuration file path. Options given on the command line take precedence.
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,
    /// The airodump-ng CSV export to read the clients from.
    #[arg(short = 's', long)]
    source: Option<PathBuf>,
    /// The file in which the clients of the previous run are stored.
    #[arg(short = 'S', long)]
    state: Option<PathBuf>,
    /// Print debug diagnostics.
    #[arg(short = 'v', long)]
    verbose: bool,
    /// How to classify clients that were not seen in the previous run.
    #[arg(long, value_enum)]
    new_clients: Option<NewClientPolicy>,
    /// Print the connected clients as a JSON array instead of one per line.
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Builds the run configuration from the configuration file, if any, and the command line.
    fn config(&self) -> anyhow::Result<PresenceConfig> {
        let mut config = match &self.config {
            Some(path) => PresenceConfig::read(path)?,
            None => PresenceConfig::default(),
        };

        if let Some(source) = &self.source {
            config.source_path = source.clone();
        }
        if let Some(state) = &self.state {
            config.state_path = state.clone();
        }
        if let Some(new_clients) = self.new_clients {
            config.new_clients = new_clients;
        }
        config.verbose |= self.verbose;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Parse command-line arguments based on the [Args] struct.
    let args = Args::parse();

    // The configuration decides the verbosity, so it is needed before logging is set up.
    let config = match args.config() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Invalid configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = if config.verbose {
        "debug"
    } else {
        args.log_level.as_str()
    };

    // Set up human-readable logging using the `tracing-subcriber` crate. Logs go to stderr so the
    // client list on stdout can be consumed by other programs.
    tracing_subscriber::fmt()
        .with_env_filter(match EnvFilter::builder().parse(log_level) {
            Ok(v) => v,
            Err(err) => {
                eprintln!("Failed to parse log_level argument: {err:?}");
                return ExitCode::FAILURE;
            }
        })
        .with_writer(std::io::stderr)
        .init();
    debug!("Debug logging is enabled");
    debug!(?config, "Using configuration");

    let active = match presence::run(&config) {
        Ok(v) => v,
        Err(err) => {
            error!("Presence run failed: {:#}", anyhow::Error::from(err));
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = print_active(&active, args.json) {
        error!("Could not print connected clients: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn print_active(active: &ActiveSet, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(active)?);
    } else {
        for client in active {
            println!("{client}");
        }
    }
    Ok(())
}
