//! # VSP Storage Binary
//!
//! # Usage
//!
//! ```bash
//! # Append raw frames
//! vsp_storage --kind binary --output /data/frames.bin
//!
//! # Track as KML, written on shutdown
//! vsp_storage --kind kml --output /data/track.kml -v
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use vsp_common::config::parse_queue_key;
use vsp_common::consts::{CHANNEL_DATA, DATA_MSG_MAX, DEFAULT_QUEUE_KEY};
use vsp_ipc::{QueueChannel, QueueError};
use vsp_storage::{SinkKind, SinkRegistry, StorageConsumer};

/// VSP Storage - persists the orchestrator's data frames
#[derive(Parser, Debug)]
#[command(name = "vsp_storage")]
#[command(version)]
#[command(about = "Storage consumer for the sensor platform")]
#[command(long_about = None)]
struct Args {
    /// Output kind: binary, text or kml
    #[arg(short, long, default_value = "text")]
    kind: SinkKind,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// System V message queue key (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_queue_key)]
    queue_key: Option<i32>,

    /// Sleep between empty receives, in milliseconds
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Storage consumer failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("VSP storage v{} starting...", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let key = args.queue_key.unwrap_or(DEFAULT_QUEUE_KEY);
    let poll = Duration::from_millis(args.poll_ms);
    let Some(rx) = open_data_channel(key, poll, &running)? else {
        info!("Stopped before the data channel appeared");
        return Ok(());
    };

    let mut sink = SinkRegistry::with_builtin().create(args.kind)?;
    sink.initialize(&args.output)?;
    sink.open()?;
    info!("Storing {} output to {}", args.kind, args.output.display());

    let mut consumer = StorageConsumer::new(rx, sink, poll).with_running_flag(running);
    consumer.run();
    consumer.finish()?;

    info!("VSP storage shutdown complete");
    Ok(())
}

/// Wait for the orchestrator to create the queue.
fn open_data_channel(
    key: i32,
    poll: Duration,
    running: &AtomicBool,
) -> Result<Option<QueueChannel>, QueueError> {
    let mut waiting_logged = false;
    while running.load(Ordering::SeqCst) {
        match QueueChannel::open(key, CHANNEL_DATA, DATA_MSG_MAX) {
            Ok(rx) => return Ok(Some(rx)),
            Err(QueueError::NotFound { .. }) => {
                if !waiting_logged {
                    info!("Waiting for data channel {:#x}", key);
                    waiting_logged = true;
                }
                std::thread::sleep(poll.max(Duration::from_millis(100)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
