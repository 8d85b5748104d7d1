//! Arcana CLI - reading service and headless reading driver.
//!
//! ```text
//! arcana serve            -> arcana_server::Server (GET /api, POST /api/threecard)
//! arcana read -q "..."    -> arcana_engine::Engine driven frame by frame -> stdout
//! ```
//!
//! Configuration comes from `~/.arcana/config.toml` (all optional). Logs go
//! to the configured log file, or stderr when none is set or it cannot be
//! opened. Reading text always goes to stdout.

mod driver;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use arcana_config::ArcanaConfig;
use arcana_providers::{ApiConfig, DEFAULT_MODEL, retry::RetryConfig};
use arcana_server::Server;

#[derive(Parser)]
#[command(
    name = "arcana",
    about = "Three-card tarot readings with a streamed interpretation",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reading service
    Serve {
        /// Interface to bind (overrides config and ARCANA_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config and ARCANA_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Play one full reading against a running service and print it
    Read {
        /// The question to ask the cards
        #[arg(short, long)]
        question: String,

        /// Reading endpoint (overrides config and ARCANA_ENDPOINT)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Seed the shuffle and card orientation
        #[arg(long)]
        seed: Option<u64>,

        /// Use the narrow-screen fan layout
        #[arg(long)]
        compact: bool,
    },
}

fn init_tracing(log_file: Option<PathBuf>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file, init_warnings) = match log_file {
        Some(path) => open_log_file(path),
        None => (None, Vec::new()),
    };

    if let Some((log_path, file)) = file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
        tracing::info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }

    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: PathBuf) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warnings.push(format!(
            "Failed to create log dir {}: {e}",
            parent.display()
        ));
        return (None, warnings);
    }

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => (Some((path, file)), warnings),
        Err(e) => {
            warnings.push(format!("Failed to open log file {}: {e}", path.display()));
            (None, warnings)
        }
    }
}

fn api_config(config: &ArcanaConfig) -> Result<ApiConfig> {
    let api_key = config.api_key()?;
    let model = config.model().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let mut api = ApiConfig::new(api_key, model)?;
    if let Some(base_url) = config.base_url() {
        api = api.with_base_url(base_url)?;
    }
    if let Some(max_retries) = config.max_retries() {
        api = api.with_retry_config(RetryConfig::default().with_max_retries(max_retries));
    }
    Ok(api)
}

fn bind_addr(config: &ArcanaConfig, host: Option<String>, port: Option<u16>) -> String {
    let configured = config.listen_addr();
    if host.is_none() && port.is_none() {
        return configured;
    }
    let (default_host, default_port) = configured
        .rsplit_once(':')
        .map_or((configured.as_str(), ""), |(h, p)| (h, p));
    let host = host.unwrap_or_else(|| default_host.to_string());
    let port = port.map_or_else(|| default_port.to_string(), |p| p.to_string());
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

async fn serve(config: &ArcanaConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let api = api_config(config)?;
    let addr = bind_addr(config, host, port);
    let server = Server::bind(&addr, api).await?;

    tokio::select! {
        result = server.run() => result.context("reading service stopped"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match ArcanaConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (ArcanaConfig::default(), Some(e)),
    };
    init_tracing(config.log_file());
    if let Some(e) = config_error {
        tracing::warn!("Ignoring config: {e}");
    }

    match cli.command {
        Commands::Serve { host, port } => serve(&config, host, port).await,
        Commands::Read {
            question,
            endpoint,
            seed,
            compact,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| config.endpoint());
            let options = driver::ReadOptions {
                question,
                endpoint,
                seed,
                compact,
            };
            driver::run(&config, options).await
        }
    }
}
