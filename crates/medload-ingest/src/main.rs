//! Medload - CSV to MongoDB admission loader

use anyhow::Result;
use clap::Parser;
use medload_common::logging::{init_logging, LogConfig, LogLevel};
use medload_ingest::config::{
    MigrationConfig, DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_MONGO_URI,
};
use medload_ingest::shutdown::{watch_interrupts, Interrupt};
use medload_ingest::{prepare, MigrationPipeline, MongoStore, SourceTable, TracingObserver};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Conventional status for termination by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "medload")]
#[command(author, version, about = "Load healthcare admission records from CSV into MongoDB")]
struct Cli {
    /// Source CSV file
    #[arg(long, env = "MIGRATE_CSV")]
    csv: PathBuf,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URI", default_value = DEFAULT_MONGO_URI)]
    mongo_uri: String,

    /// Target database
    #[arg(long, env = "MONGO_DB", default_value = DEFAULT_DATABASE)]
    db: String,

    /// Target collection
    #[arg(long, env = "MONGO_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Records per bulk write
    #[arg(long, env = "MONGO_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> MigrationConfig {
        MigrationConfig::new(&self.csv)
            .with_mongo_uri(&self.mongo_uri)
            .with_database(&self.db)
            .with_collection(&self.collection)
            .with_batch_size(self.batch_size)
    }
}

async fn run(config: MigrationConfig) -> Result<()> {
    config.validate()?;

    let observer = TracingObserver::new().with_progress(std::io::stderr().is_terminal());

    info!(path = %config.csv_path.display(), "Reading source");
    let table = SourceTable::from_path(&config.csv_path)?;
    let load = prepare(&table, &observer)?;
    drop(table);

    let store = MongoStore::connect(&config.mongo_uri, &config.database, &config.collection).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await == Interrupt::ForceExit {
            eprintln!("Interrupted; exiting before the current batch completed");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let result = MigrationPipeline::new(&store, config.batch_size)
        .with_cancellation(cancel)
        .run(&load, &observer)
        .await;
    store.shutdown().await;

    let report = result?;
    info!(
        namespace = %format!("{}.{}", config.database, config.collection),
        before = report.documents_before,
        after = report.documents_after,
        "Migration complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("medload")
        .build();

    // Environment variables take precedence over flags
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {e}");
            log_config
        },
    };

    let log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {e}");
            None
        },
    };

    if let Err(e) = run(cli.to_config()).await {
        eprintln!("Error: {e:#}");
        // Flush file logs before exiting
        drop(log_guard);
        std::process::exit(1);
    }
}
