// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GNSS Telemetry Relay CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with a configuration file
//! gnss-relay --config relay.toml
//!
//! # More logging, stats every 10 seconds
//! gnss-relay --config relay.toml --log-level debug --stats-interval 10
//!
//! # Generate / check a configuration file
//! gnss-relay gen-config --output relay.toml
//! gnss-relay validate --config relay.toml
//! ```
//!
//! Exit codes: 0 on Ctrl+C or SIGTERM, 1 when login or the event stream
//! fails, 2 on configuration errors.

use clap::{Parser, Subcommand};
use gnss_relay::{
    shutdown_signal, InfluxDb, ParticleCloud, RelayConfig, SessionManager, SessionStats, Sink,
    Transformer,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_SESSION: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// GNSS telemetry relay
#[derive(Parser, Debug)]
#[command(name = "gnss-relay")]
#[command(about = "Relay GNSS and battery telemetry from the Particle cloud into InfluxDB")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    /// Statistics reporting interval (seconds, 0 to disable); overrides the config file
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "relay.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_tracing(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let loaded = RelayConfig::from_file(&args.config);
    let log_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.relay.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&log_level);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let cloud = match ParticleCloud::new(config.particle.api_url.clone()) {
        Ok(cloud) => cloud,
        Err(e) => {
            tracing::error!("Failed to create Particle client: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let influx = match InfluxDb::from_config(&config.influxdb) {
        Ok(influx) => influx,
        Err(e) => {
            tracing::error!("Failed to create InfluxDB client: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if !influx.ping().await {
        tracing::warn!(
            "InfluxDB at {} did not answer /ping, writes may fail",
            config.influxdb.url
        );
    }

    tracing::info!("GNSS relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Device {} -> {}/{} (rp {})",
        config.particle.device_id,
        config.influxdb.url,
        config.influxdb.database,
        config.transform.retention_policy
    );

    let mut session = SessionManager::new(
        cloud,
        config.particle.credentials(),
        config.particle.device_id.clone(),
        config.particle.event_filter(),
        Transformer::new(config.transform.clone()),
        Sink::new(influx),
    );

    let stats = session.stats();
    let stats_interval = args
        .stats_interval
        .unwrap_or(config.relay.stats_interval_secs);
    let reporter = (stats_interval > 0).then(|| {
        tokio::spawn(report_stats(
            Arc::clone(&stats),
            Duration::from_secs(stats_interval),
        ))
    });

    let result = session.run(shutdown_signal()).await;

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    tracing::info!("Final statistics: {}", stats.snapshot());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(EXIT_SESSION),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn report_stats(stats: Arc<SessionStats>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // First tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        tracing::info!("Statistics: {}", stats.snapshot());
    }
}

fn cmd_gen_config(output: PathBuf) -> ExitCode {
    let toml_str = match RelayConfig::example().to_toml() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to render configuration: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let content = format!(
        r#"# GNSS Relay Configuration
# Generated by gnss-relay gen-config

{}
"#,
        toml_str
    );

    if let Err(e) = std::fs::write(&output, content) {
        eprintln!("Failed to write {}: {}", output.display(), e);
        return ExitCode::from(EXIT_CONFIG);
    }
    println!("Generated configuration file: {}", output.display());
    ExitCode::SUCCESS
}

fn cmd_validate(config_path: PathBuf) -> ExitCode {
    match RelayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Particle API: {}", config.particle.api_url);
            println!(
                "Device:       {} (events: {})",
                config.particle.device_id,
                config.particle.event_filter()
            );
            println!(
                "InfluxDB:     {} db={} rp={} precision={}",
                config.influxdb.url,
                config.influxdb.database,
                config.transform.retention_policy,
                config.transform.precision
            );
            println!("Geohash:      {} chars", config.transform.geohash_precision);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
