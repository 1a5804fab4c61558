//! eam-server: HTTP front end for artifact check-out / check-in
//!
//! Reads `eam-server.toml` (or the file given with `--config`), applies CLI
//! and environment overrides, opens the store and serves the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use eam_core::{MemoryStore, SqliteStore, StoreBackend, VersionControl};
use eam_server::ServerConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "eam-server")]
#[command(about = "Check-out / check-in version control for architecture artifacts")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "eam-server.toml")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(short, long, env = "EAM_BIND")]
    bind: Option<SocketAddr>,

    /// SQLite database file (overrides config file)
    #[arg(short, long, env = "EAM_DATABASE")]
    database: Option<PathBuf>,

    /// Seconds between lock reaper passes (overrides config file)
    #[arg(long, env = "EAM_REAPER_INTERVAL_SECS")]
    reaper_interval_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "EAM_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("eam_server=info".parse()?)
        .add_directive("eam_core=info".parse()?);
    match cli.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting eam-server {}", eam_server::VERSION);
    info!("Config file: {}", cli.config.display());

    let mut config = ServerConfig::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(database) = cli.database {
        config.database = Some(database);
    }
    if let Some(secs) = cli.reaper_interval_secs {
        config.reaper_interval_secs = Some(secs);
    }

    let store = match &config.database {
        Some(path) => {
            info!("Database: {}", path.display());
            StoreBackend::Sqlite(SqliteStore::open(path)?)
        }
        None => {
            warn!("No database configured, state is kept in memory only");
            StoreBackend::Memory(MemoryStore::new())
        }
    };

    let directory = config.directory();
    if directory.is_empty() {
        warn!("User directory is empty, every write will be denied");
    } else {
        info!("Loaded {} user(s)", directory.len());
    }
    info!(
        "Lock TTL: {}s, auto rebase: {}",
        config.version_control.lock_ttl_secs, config.version_control.auto_rebase
    );

    let vc = Arc::new(
        VersionControl::new(store, Arc::new(directory)).with_config(config.version_control.clone()),
    );

    match config.reaper_interval_secs.filter(|secs| *secs > 0) {
        Some(secs) => {
            info!("Lock reaper every {}s", secs);
            eam_server::spawn_reaper(Arc::clone(&vc), Duration::from_secs(secs));
        }
        None => info!("Lock reaper disabled, expired locks are filtered at read time"),
    }

    let app = eam_server::router(vc);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
