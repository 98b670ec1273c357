//! # VSP Orchestrator Binary
//!
//! # Usage
//!
//! ```bash
//! # Spawn every configured child and start sampling
//! vsp --config /etc/vsp/vsp.conf
//!
//! # Wait for the start button, debug logging
//! vsp --config /etc/vsp/vsp.conf --manual-start -v
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vsp::{Orchestrator, OrchestratorConfig, Supervisor};
use vsp_common::consts::{DEFAULT_QUEUE_KEY, DEFAULT_SHM_NAME};
use vsp_common::config::parse_queue_key;
use vsp_common::prelude::{ConfigError, KeyValueConfig, LogLevel};

/// VSP Orchestrator - sensor platform sampling loop and process supervisor
#[derive(Parser, Debug)]
#[command(name = "vsp")]
#[command(version)]
#[command(about = "Sensor platform orchestrator")]
#[command(long_about = None)]
struct Args {
    /// Path to the key=value configuration file
    #[arg(short, long, default_value = "/etc/vsp/vsp.conf")]
    config: PathBuf,

    /// Name of the shared memory region
    #[arg(long, default_value = DEFAULT_SHM_NAME)]
    shm_name: String,

    /// System V message queue key (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_queue_key)]
    queue_key: Option<i32>,

    /// Wait for the start button before spawning sensor processes
    #[arg(long)]
    manual_start: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Orchestrator failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file = KeyValueConfig::load(&args.config);
    let level = match &file {
        Ok(config) => configured_level(config),
        Err(_) => Ok(LogLevel::default()),
    };
    setup_tracing(&args, level.as_ref().copied().unwrap_or_default());

    info!("VSP orchestrator v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Err(e) = &level {
        warn!("Ignoring log.level ({}), using {}", e, LogLevel::default());
    }
    let file = file.map_err(|e| format!("{}: {}", args.config.display(), e))?;
    info!("Loaded {} configuration entries from {:?}", file.len(), args.config);

    let mut config = OrchestratorConfig::from_config(&file)?;
    config.shm_name = args.shm_name.clone();
    config.queue_key = args.queue_key.unwrap_or(DEFAULT_QUEUE_KEY);
    config.manual_start |= args.manual_start;

    let supervisor = Supervisor::from_config(&file);
    let mut orchestrator = Orchestrator::new(config, Box::new(supervisor))?;

    let running = orchestrator.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    orchestrator.run();
    drop(orchestrator);

    info!("VSP orchestrator shutdown complete");
    Ok(())
}

/// Level from `log.level`, `info` when the key is absent.
fn configured_level(config: &KeyValueConfig) -> Result<LogLevel, ConfigError> {
    Ok(config.get_parsed::<LogLevel>("log.level")?.unwrap_or_default())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        level.as_tracing()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["vsp", "--config", "x.conf", "--manual-start", "--queue-key", "0x10"]);
        assert!(args.manual_start);
        assert_eq!(args.queue_key, Some(16));
        assert_eq!(args.shm_name, DEFAULT_SHM_NAME);
    }

    #[test]
    fn test_configured_level() {
        let config: KeyValueConfig = "log.level=debug".parse().unwrap();
        assert_eq!(configured_level(&config).unwrap(), LogLevel::Debug);

        assert_eq!(
            configured_level(&KeyValueConfig::default()).unwrap(),
            LogLevel::Info
        );

        let config: KeyValueConfig = "log.level=loud".parse().unwrap();
        assert!(matches!(
            configured_level(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
