//! Backfill CLI - republishes refreshed source database records to Kafka

use anyhow::{Context, Result};
use backfill_core::{BridgeConfig, BusNotifier, DispatchLoop, Extractor, ShutdownHandle};
use backfill_kafka::{KafkaConfig, KafkaReader, KafkaWriter};
use backfill_sqlite::SqliteSourceStore;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "backfill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Kafka broker addresses (comma-separated)
    #[arg(long, env = "KAFKA_HOST")]
    kafka_host: String,

    /// Kafka socket and delivery timeout, in seconds
    #[arg(long, env = "KAFKA_TIMEOUT", default_value_t = 10)]
    kafka_timeout: u64,

    /// Send attempts per published message
    #[arg(long, env = "KAFKA_ATTEMPTS", default_value_t = 3)]
    kafka_attempts: u32,

    /// Consumer group for the meta topic
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "source-db-records-importer")]
    group_id: String,

    /// Topic carrying refresh signals and notifications
    #[arg(long, env = "KAFKA_META_TOPIC", default_value = "meta_events")]
    meta_topic: String,

    /// Topic receiving the extracted records
    #[arg(long, env = "KAFKA_RECORDS_TOPIC", default_value = "raw_records")]
    records_topic: String,

    /// Path to the source SQLite database
    #[arg(long, env = "SOURCE_DB_PATH")]
    source_db_path: PathBuf,

    /// Records per published batch
    #[arg(long, env = "WRITE_THRESHOLD", default_value_t = 500)]
    write_threshold: usize,

    /// Days subtracted from the start of each refreshed range
    #[arg(long, env = "LOOKBACK_DAYS", default_value_t = 2)]
    lookback_days: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    load_env_file(Path::new(".env"));
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Variables from `.env` in the working directory, if present, feed the
/// clap `env` fallbacks of [`Cli`]. Variables already set in the process win.
fn load_env_file(path: &Path) {
    if path.exists() {
        if let Err(e) = dotenv::from_path(path) {
            eprintln!("failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let bridge_config = BridgeConfig::new()
        .with_write_threshold(cli.write_threshold)
        .with_lookback_days(cli.lookback_days);
    bridge_config.validate()?;

    let mut kafka_config = KafkaConfig::new(cli.kafka_host)
        .with_group_id(cli.group_id)
        .with_timeout(Duration::from_secs(cli.kafka_timeout))
        .with_attempts(cli.kafka_attempts);
    kafka_config.meta_topic = cli.meta_topic;
    kafka_config.records_topic = cli.records_topic;

    let store = SqliteSourceStore::open(&cli.source_db_path)
        .with_context(|| format!("opening {}", cli.source_db_path.display()))?;
    let reader = KafkaReader::new(&kafka_config).context("creating meta topic consumer")?;
    let records = KafkaWriter::records(&kafka_config).context("creating records producer")?;
    let meta = KafkaWriter::meta(&kafka_config).context("creating meta producer")?;

    let shutdown = ShutdownHandle::new();
    spawn_signal_listener(shutdown.clone())?;

    let extractor = Extractor::new(store, records, bridge_config);
    let mut dispatch =
        DispatchLoop::new(reader, extractor, BusNotifier::new(meta)).with_shutdown(shutdown);

    tracing::info!(
        "Waiting for refresh signals on {} (brokers: {})",
        kafka_config.meta_topic,
        kafka_config.brokers
    );

    let err = dispatch.run();
    if err.is_cancelled() {
        tracing::info!("Shut down after {} cycles", dispatch.cycles());
        return Ok(());
    }
    Err(err.into())
}

/// Trips `shutdown` on Ctrl-C. The dispatch loop notices it at the next
/// fetch.
fn spawn_signal_listener(shutdown: ShutdownHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;

    std::thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupt received, stopping after the current cycle");
                        shutdown.shutdown();
                    }
                    Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
                }
            })
        })
        .context("spawning signal listener")?;

    Ok(())
}
