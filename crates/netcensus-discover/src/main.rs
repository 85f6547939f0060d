//! CLI entry point for the netcensus-discover pipeline.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use netcensus_discover::classify::RecogClassifier;
use netcensus_discover::config::DiscoverConfig;
use netcensus_discover::engine::CorrelationEngine;
use netcensus_discover::probe::http::HttpProbe;
use netcensus_discover::probe::mdns::MdnsProbe;
use netcensus_discover::probe::IdentityProbe;
use netcensus_discover::report;
use netcensus_discover::sweep::NmapSweeper;

#[derive(Parser)]
#[command(name = "netcensus-discover")]
#[command(about = "Single-pass network device discovery and identification")]
struct Cli {
    /// Target subnet to scan (CIDR notation, e.g., 172.20.0.0/24).
    #[arg(short, long)]
    target: Option<String>,

    /// Report file path (stdout when omitted).
    #[arg(short, long)]
    output: Option<String>,

    /// Skip the passive mDNS phase.
    #[arg(long)]
    no_mdns: bool,

    /// Skip the active HTTP phase.
    #[arg(long)]
    no_http: bool,

    /// Config file prefix (default: netcensus).
    #[arg(short, long, default_value = "netcensus")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut config = load_discover_config(&cli.config)?;
    if let Some(target) = cli.target {
        config.target = target;
    }
    if cli.output.is_some() {
        config.output = cli.output;
    }

    if config.startup_delay_secs > 0 {
        tokio::time::sleep(Duration::from_secs(config.startup_delay_secs)).await;
    }

    // Verify nmap before committing to the run.
    let sweeper = NmapSweeper::new(
        &config.nmap_path,
        Duration::from_secs(config.sweep_timeout_secs),
    );
    let version = sweeper.verify_installation().await?;
    tracing::info!(nmap_version = %version.trim(), "Nmap verified");

    let classifier = Arc::new(RecogClassifier::new(&config.recog));

    let mut probes: Vec<Box<dyn IdentityProbe>> = Vec::new();
    if !cli.no_mdns {
        probes.push(Box::new(MdnsProbe::new(&config.mdns)));
    }
    if !cli.no_http {
        probes.push(Box::new(HttpProbe::new(&config.http, classifier)?));
    }

    tracing::info!(target = %config.target, phases = probes.len(), "Starting discovery run");

    let engine = CorrelationEngine::new(probes);
    let records = engine.run(&sweeper, &config.target).await?;

    report::write_report(&records, config.output.as_deref())?;
    tracing::info!(hosts = records.len(), "Discovery complete");

    Ok(())
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("NETCENSUS_DISCOVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(_) => Ok(DiscoverConfig::default()),
    }
}
