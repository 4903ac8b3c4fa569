use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

use wgpool::config::Config;
use wgpool::config_loader::{self, CliOverrides};
use wgpool::ops::{self, OpOutcome, ReplayReport};

/// Address pool for WireGuard peers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the pool configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CIDR to allocate from, overriding the configuration file
    #[arg(long)]
    cidr: Option<String>,

    /// Operation script to replay against the pool
    #[arg(long)]
    ops: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config_loader::load_config(path)?,
        None => Config::default(),
    };
    config_loader::apply_overrides(&mut config, &CliOverrides { cidr: args.cidr.clone() })?;

    // RUST_LOG takes precedence over the configured level
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level())).init();

    info!("Starting wgpool for {}", config.pool.cidr);

    let pool = config_loader::build_pool(&config)?;

    let json = match &args.ops {
        Some(path) => {
            let script = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read operation script '{}'", path.display()))?;
            let parsed = ops::parse_ops(&script)
                .wrap_err_with(|| format!("Invalid operation script '{}'", path.display()))?;
            info!("Replaying {} operations from {:?}", parsed.len(), path);

            let outcomes = ops::replay(&pool, &parsed);
            for outcome in &outcomes {
                log_outcome(outcome);
            }

            let report = ReplayReport {
                outcomes,
                snapshot: pool.snapshot(),
            };
            serde_json::to_string_pretty(&report)?
        }
        None => serde_json::to_string_pretty(&pool.snapshot())?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &json)
                .wrap_err_with(|| format!("Failed to write report '{}'", path.display()))?;
            info!("Report written to {:?}", path);
        }
        None => println!("{}", json),
    }

    info!("Pool utilization: {}", pool.utilization());
    Ok(())
}

fn log_outcome(outcome: &OpOutcome) {
    match outcome {
        OpOutcome::Assigned { peer, address } => info!("assign {} -> {}", peer, address),
        OpOutcome::Rejected { peer, reason } => info!("assign {} rejected: {}", peer, reason),
        OpOutcome::Released { peer, found } => info!("release {} -> {}", peer, found),
        OpOutcome::ReleasedIp { address, peer } => info!("release-ip {} -> {:?}", address, peer),
        OpOutcome::Found { peer, address } => debug!("lookup {} -> {:?}", peer, address),
        OpOutcome::Stats { allocated, total } => info!("stats {}/{}", allocated, total),
    }
}
