//! tablewal CLI
//!
//! Inspects a WAL namespace kept in a local filesystem object store.

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tablewal::wal::WalReader;
use tablewal::{FsObjectStore, WalConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// tablewal CLI
#[derive(Parser, Debug)]
#[command(name = "tablewal-cli")]
#[command(about = "Inspect a tablewal namespace on the local filesystem")]
#[command(version)]
struct Args {
    /// Root directory of the object store
    #[arg(short, long, default_value = "./tablewal_data")]
    root: String,

    /// Key prefix of the WAL namespace
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Max attempts per object store call
    #[arg(long, default_value = "3")]
    retry_count: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every recovered entry in write order
    Dump {
        /// Only print entries for this table
        #[arg(short, long)]
        table: Option<String>,
    },

    /// List segments with their sizes and frame counts
    Segments,

    /// Decode every segment and report the first problem found
    Verify,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablewal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("tablewal CLI v{}", tablewal::VERSION);

    let store = match FsObjectStore::open(&args.root) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store at {}: {}", args.root, e);
            process::exit(1);
        }
    };

    let config = WalConfig::builder()
        .key_prefix(&args.prefix)
        .retry_count(args.retry_count)
        .build();

    let result = match args.command {
        Commands::Dump { table } => dump(store, config, table.as_deref()),
        Commands::Segments => segments(store, config),
        Commands::Verify => verify(store, config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn dump(store: Arc<FsObjectStore>, config: WalConfig, table: Option<&str>) -> tablewal::Result<()> {
    let reader = WalReader::new(store, config);
    for entry in reader.read_all()? {
        let entry = entry?;
        if table.map_or(true, |t| t == entry.table_name) {
            println!("{:?}", entry);
        }
    }
    Ok(())
}

fn segments(store: Arc<FsObjectStore>, config: WalConfig) -> tablewal::Result<()> {
    let reader = WalReader::new(store, config);
    println!("{:>10}  {:>10}  {:>8}  key", "sequence", "bytes", "frames");
    for info in reader.segments()? {
        let scan = reader.scan_segment(&info.key)?;
        println!(
            "{:>10}  {:>10}  {:>8}  {}",
            info.sequence, scan.stored_len, scan.frames, info.key
        );
        if let Some(e) = scan.error {
            println!("{:>10}  {}", "", e);
        }
    }
    Ok(())
}

fn verify(store: Arc<FsObjectStore>, config: WalConfig) -> tablewal::Result<()> {
    let reader = WalReader::new(store, config);
    let mut segments = 0usize;
    let mut frames = 0usize;
    let mut records = 0usize;

    for info in reader.segments()? {
        let scan = reader.scan_segment(&info.key)?;
        if let Some(e) = scan.error {
            return Err(e);
        }
        segments += 1;
        frames += scan.frames;
        records += scan.records;
    }

    println!(
        "OK: {} segment(s), {} frame(s), {} record(s)",
        segments, frames, records
    );
    Ok(())
}
