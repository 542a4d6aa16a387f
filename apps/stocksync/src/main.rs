//! stocksync - mirror site stock and the product catalogue into the shop
//! database.
//!
//! Each invocation runs one reconciliation:
//! - Read every record from the source database
//! - Compare fingerprints against the destination
//! - Update changed rows and insert new ones, one transaction per chunk

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use stocksync_connector_database::{
    connect, DatabaseConfig, PgDestination, PgSource, ProductSource, ProductTable, StockSource,
    StockTable,
};
use stocksync_engine::{
    RunReport, RunSummary, SyncConfig, SyncCoordinator, SyncObserver, TracingObserver,
};
use tracing::{error, info};

mod config;
mod error;
mod logging;
mod progress;

use config::AppConfig;
use error::{CliError, CliResult};
use progress::ProgressObserver;

/// Synchronise the shop database from the ERP
#[derive(Parser, Debug)]
#[command(name = "stocksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Number of parallel workers (overrides STOCKSYNC_WORKERS)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Site whose stock is synchronised (overrides STOCKSYNC_SITE_ID)
    #[arg(long, global = true)]
    site_id: Option<i32>,

    /// Directory for the dated log file (overrides STOCKSYNC_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log progress instead of drawing a progress bar
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Synchronise per-site stock and prices (default)
    Stock,

    /// Synchronise the product catalogue
    Products,
}

impl Command {
    fn entity(self) -> &'static str {
        match self {
            Command::Stock => "stock",
            Command::Products => "products",
        }
    }
}

impl Cli {
    fn selected(&self) -> Command {
        self.command.unwrap_or(Command::Stock)
    }

    /// Apply command-line overrides on top of the environment.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(site_id) = self.site_id {
            config.site_id = site_id;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(exit_code = e.exit_code(), error = %e, "stocksync finished with errors");
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);

    let log_file = logging::init(&config.log_dir)?;

    let sync_config = match config.workers {
        Some(workers) => SyncConfig::default().with_workers(workers),
        None => SyncConfig::default(),
    };
    sync_config.validate()?;

    let command = cli.selected();
    info!(
        entity = command.entity(),
        workers = sync_config.worker_count,
        log_file = %log_file.display(),
        "Starting synchronisation"
    );

    let observer: Arc<dyn SyncObserver> = if cli.no_progress {
        Arc::new(TracingObserver)
    } else {
        Arc::new(ProgressObserver::new(command.entity()))
    };

    let report = match command {
        Command::Stock => sync_stock(&config, sync_config, observer).await?,
        Command::Products => sync_products(&config, sync_config, observer).await?,
    };

    check_summary(&report.summary)
}

/// Map chunk failures onto the process outcome.
///
/// Exit 2 is kept for runs where some chunks committed.
fn check_summary(summary: &RunSummary) -> CliResult<()> {
    match summary.chunks_failed {
        0 => Ok(()),
        failed if failed >= summary.chunks_total => Err(CliError::NothingCommitted {
            total: summary.chunks_total,
        }),
        failed => Err(CliError::PartialRun {
            failed,
            total: summary.chunks_total,
        }),
    }
}

async fn sync_stock(
    config: &AppConfig,
    sync_config: SyncConfig,
    observer: Arc<dyn SyncObserver>,
) -> CliResult<RunReport> {
    let pools = Pools::open(config, &sync_config).await?;

    let mut mapping = StockSource::new(config.site_id);
    if let Some(query) = &config.stock_query {
        mapping = mapping.with_query(query.clone());
    }
    info!(site_id = mapping.site_id(), "Stock source configured");

    let source = PgSource::new(pools.source, mapping);
    let destination =
        PgDestination::new(pools.destination, StockTable::new(&pools.destination_config))
            .with_acquire_timeout_secs(config.pool_timeout_secs);

    let report = SyncCoordinator::new(source, destination, sync_config)
        .with_observer(observer)
        .run()
        .await?;

    Ok(report)
}

async fn sync_products(
    config: &AppConfig,
    sync_config: SyncConfig,
    observer: Arc<dyn SyncObserver>,
) -> CliResult<RunReport> {
    let pools = Pools::open(config, &sync_config).await?;

    let mut mapping = ProductSource::new(config.brand_id);
    if let Some(query) = &config.product_query {
        mapping = mapping.with_query(query.clone());
    }
    info!(brand_id = config.brand_id, "Product source configured");

    let source = PgSource::new(pools.source, mapping);
    let destination =
        PgDestination::new(pools.destination, ProductTable::new(&pools.destination_config))
            .with_acquire_timeout_secs(config.pool_timeout_secs);

    let report = SyncCoordinator::new(source, destination, sync_config)
        .with_observer(observer)
        .run()
        .await?;

    Ok(report)
}

/// Connection pools for one run.
struct Pools {
    source: PgPool,
    destination: PgPool,
    destination_config: DatabaseConfig,
}

impl Pools {
    /// Connect both databases.
    ///
    /// The destination pool holds one connection per worker plus one spare,
    /// the source pool a single connection for the one extraction query.
    async fn open(config: &AppConfig, sync_config: &SyncConfig) -> CliResult<Self> {
        let source_config = DatabaseConfig::new(&config.source_database_url)
            .with_pool_size(1)
            .with_acquire_timeout_secs(config.pool_timeout_secs);
        let destination_config = DatabaseConfig::new(&config.destination_database_url)
            .with_pool_size(sync_config.destination_pool_size())
            .with_acquire_timeout_secs(config.pool_timeout_secs);

        info!(
            source = %source_config.display_target(),
            destination = %destination_config.display_target(),
            "Connecting databases"
        );

        let source = connect(&source_config)
            .await
            .map_err(|source| CliError::Connection {
                role: "source",
                source,
            })?;
        let destination = connect(&destination_config)
            .await
            .map_err(|source| CliError::Connection {
                role: "destination",
                source,
            })?;

        Ok(Self {
            source,
            destination,
            destination_config,
        })
    }
}
