use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use albie_config::AppConfig;
use albie_core::history::{generate_session_id, resolve_data_dir, HistoryConfig, HistoryStore, SessionRegistry};
use albie_core::Endpoint;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter used until the config file has been read.
const PROVISIONAL_LOG_FILTER: &str = "info";

/// Serves migration-wizard history requests as JSON lines on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "albie-history", version, about)]
struct Cli {
    /// Session used by requests that don't name one. A new ID is generated if omitted.
    #[arg(long)]
    session: Option<String>,

    /// Config file path (defaults to `albie.json` next to the executable).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the history database; overrides the config file.
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Keep history in memory only.
    #[arg(long = "in-memory")]
    in_memory: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = load_config(&config_path, io::stderr);

    // Initialize logging (stderr; stdout carries responses)
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter(&config.log_filter))
        .init();

    let history_config = HistoryConfig {
        max_history: config.max_history,
        data_dir: cli
            .data_dir
            .clone()
            .or_else(|| config.resolve_data_dir())
            .unwrap_or_else(resolve_data_dir),
    };

    let store = if cli.in_memory || !config.persist_history {
        None
    } else {
        Some(HistoryStore::open(&history_config.data_dir).context("Failed to open history store")?)
    };

    let session = cli.session.unwrap_or_else(generate_session_id);
    tracing::info!(
        session = %session,
        persistent = store.is_some(),
        "Starting albie-history"
    );

    let endpoint = Endpoint::new(SessionRegistry::new(history_config, store), Some(session));

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = endpoint.handle_json(&line);
        let json = response.to_json().context("Failed to encode response")?;
        writeln!(stdout, "{json}").context("Failed to write response")?;
        stdout.flush().context("Failed to flush response")?;
    }

    Ok(())
}

/// `RUST_LOG` if set, otherwise `fallback`.
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Reads the config with a provisional subscriber in scope, so warnings
/// about a broken config file reach `writer`.
fn load_config<W>(path: &Path, writer: W) -> AppConfig
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let provisional = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(env_filter(PROVISIONAL_LOG_FILTER))
        .finish();
    tracing::subscriber::with_default(provisional, || AppConfig::load_or_create(path))
}
