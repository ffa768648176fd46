// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TTN uplink bridge CLI
//!
//! Forwards CO2 sensor uplinks from a The Things Network application into
//! InfluxDB.
//!
//! # Usage
//!
//! ```bash
//! # Run with built-in defaults; the access key comes from the environment
//! TTNPASSWD=ttn-account-v2.xxxx ttn-bridge
//!
//! # Using a configuration file
//! ttn-bridge --config ttn-bridge.toml
//!
//! # Decode and validate without touching InfluxDB
//! ttn-bridge --dry-run --log-level debug
//!
//! # Print the stored uplinks of one device
//! ACCESSKEY=ttn-account-v2.xxxx ttn-bridge history --device co2ampelbndlg_dev01 --last 2d
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ttn_bridge::history::{HistoryClient, HistoryRecord};
use ttn_bridge::{
    Bridge, BridgeConfig, InfluxClient, MemoryStore, MqttTransport, PointStore,
    SubscriptionManager,
};

#[derive(Parser, Debug)]
#[command(name = "ttn-bridge")]
#[command(author = "naskel.com")]
#[command(about = "Forward TTN CO2 sensor uplinks into InfluxDB")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Application access key (MQTT password)
    #[arg(long, env = "TTNPASSWD", hide_env_values = true)]
    access_key: Option<String>,

    /// Keep accepted points in memory instead of writing to InfluxDB
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a configuration file with the default settings
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "ttn-bridge.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
    },

    /// Print the uplinks kept by the storage integration
    History {
        /// Device id (defaults to history.device_id)
        #[arg(short, long)]
        device: Option<String>,

        /// Time window, e.g. 7d, 12h, 30m (defaults to history.last)
        #[arg(short, long)]
        last: Option<String>,

        /// Storage integration access key
        #[arg(long, env = "ACCESSKEY", hide_env_values = true)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Some(Commands::GenConfig { output }) => cmd_gen_config(output),
        Some(Commands::Validate { file }) => cmd_validate(file),
        Some(Commands::History { device, last, key }) => {
            let config = load_config(args.config.as_ref())?;
            cmd_history(&config, device, last, key).await
        }
        None => {
            let config = load_config(args.config.as_ref())?;
            let access_key = args
                .access_key
                .or_else(|| config.feed.access_key.clone())
                .context("no feed access key: set TTNPASSWD or feed.access_key")?;

            let result = if args.dry_run {
                info!("dry run: points are kept in memory");
                run_pipeline(&config, &access_key, MemoryStore::new()).await
            } else {
                let store =
                    InfluxClient::new(&config.store).context("failed to create InfluxDB client")?;
                run_pipeline(&config, &access_key, store).await
            };

            if let Err(e) = &result {
                error!(error = %format!("{:#}", e), "bridge stopped on fatal error");
            }
            result
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

async fn run_pipeline<S: PointStore>(
    config: &BridgeConfig,
    access_key: &str,
    store: S,
) -> Result<()> {
    let mut bridge = Bridge::new(store, &config.store.measurement);
    bridge
        .prepare(&config.store.database)
        .await
        .with_context(|| format!("failed to create database '{}'", config.store.database))?;

    let transport =
        MqttTransport::new(&config.feed, access_key).context("invalid feed configuration")?;
    let mut subscription = SubscriptionManager::new(
        transport,
        &config.feed.topic,
        config.feed.reconnect.clone(),
    );
    subscription
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.feed.broker))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    bridge
        .run(&mut subscription, shutdown)
        .await
        .context("feed lost")?;
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    let content = BridgeConfig::default()
        .to_toml()
        .context("failed to render configuration")?;
    std::fs::write(&output, content)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(path: PathBuf) -> Result<()> {
    match BridgeConfig::from_file(&path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Feed:  {} (app {})", config.feed.broker, config.feed.app_id);
            println!("Topic: {}", config.feed.topic);
            println!(
                "Store: {} -> {}.{}",
                config.store.url, config.store.database, config.store.measurement
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

async fn cmd_history(
    config: &BridgeConfig,
    device: Option<String>,
    last: Option<String>,
    key: Option<String>,
) -> Result<()> {
    let Some(key) = key else {
        bail!("no storage integration key: set ACCESSKEY or pass --key");
    };
    let device = device.unwrap_or_else(|| config.history.device_id.clone());
    let last = last.unwrap_or_else(|| config.history.last.clone());

    let client = HistoryClient::new(&config.history, &config.feed.app_id, key)
        .context("failed to create history client")?;
    let records = client
        .query(&device, &last)
        .await
        .with_context(|| format!("history query for '{}' failed", device))?;

    print_records(&device, &last, &records);
    Ok(())
}

fn print_records(device: &str, last: &str, records: &[HistoryRecord]) {
    println!("{} uplinks from {} over the last {}", records.len(), device, last);
    if records.is_empty() {
        return;
    }
    println!();
    println!("{:<36} {:>8} {:>8} {:>8}", "time", "co2", "hum", "tmp");
    for record in records {
        println!(
            "{:<36} {:>8} {:>8} {:>8}",
            record.time, record.co2, record.hum, record.tmp
        );
    }
}
