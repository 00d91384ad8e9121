use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hindsight::config::{Config, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "hindsight",
    version,
    about = "Serves one of last year's top performers, picked fresh every day",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json, pretty)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(short = 'l', long, global = true)]
    log_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Quandl API key
    #[arg(short = 'k', long, global = true)]
    api_key: Option<String>,

    /// Backup file for the current selection
    #[arg(short = 't', long, global = true)]
    backup_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore or refresh the selection, then serve it over HTTP
    Serve {
        /// Port to serve HTTP traffic on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Enable permissive CORS headers
        #[arg(long, default_value = "false")]
        cors: bool,
    },

    /// Run one refresh cycle and print the winner
    Refresh {
        /// Do not write the backup file
        #[arg(long, default_value = "false")]
        no_backup: bool,
    },

    /// Print the selection stored in the backup file
    ShowBackup {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print when the next refresh is due
    NextRefresh,
}

impl Cli {
    /// Command-line values override file and environment values
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(key) = &self.api_key {
            config.source.api_key = key.clone();
        }
        if let Some(path) = &self.backup_path {
            config.backup.path = path.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        if let Commands::Serve { port, host, .. } = &self.command {
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(host) = host {
                config.server.host = host.clone();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Initialize tracing/logging
    setup_tracing(&config.logging, cli.verbose)?;

    if let Err(e) = hindsight::metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hindsight starting");

    match cli.command {
        Commands::Serve { cors, .. } => {
            commands::serve(config, commands::ServeParams { cors }).await?;
        }

        Commands::Refresh { no_backup } => {
            commands::refresh(config, no_backup).await?;
        }

        Commands::ShowBackup { json } => {
            commands::show_backup(&config, json).await?;
        }

        Commands::NextRefresh => {
            commands::next_refresh(&config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("hindsight=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("hindsight={},warn", logging.level))
    };

    let (writer, ansi) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(ansi)
                        .with_writer(writer),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(ansi)
                        .with_writer(writer),
                )
                .init();
        }
    }

    Ok(())
}
