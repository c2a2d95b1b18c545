use anyhow::Context;
use clap::Parser;
use config_engine::{TrustAnchorLocator, ValidatorConfig};
use rpki_validator::{RunSummary, Validator};
use std::path::PathBuf;
use tracing::info;

/// RPKI trust anchor validator
#[derive(Parser, Debug)]
#[command(name = "rpki-validator")]
#[command(about = "Periodically validates RPKI trust anchors and their repositories")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "RPKI_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of trust anchor locator files, overrides the configuration
    #[arg(long)]
    tal_dir: Option<PathBuf>,

    /// Validate every trust anchor once and exit
    #[arg(long)]
    once: bool,

    /// Bypass repository reuse and fetch everything again
    #[arg(long)]
    force_fetch: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ValidatorConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = args.tal_dir {
        config.tal_directory = dir;
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    if args.json {
        config.logging.json = true;
    }

    telemetry::init_tracing(&config.logging.level, config.logging.json)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting RPKI validator");

    if let Some(address) = &config.metrics.listen_address {
        telemetry::metrics::install_prometheus(address)?;
    }

    let locators = TrustAnchorLocator::load_directory(&config.tal_directory)
        .with_context(|| format!("loading trust anchors from {}", config.tal_directory.display()))?;
    if locators.is_empty() {
        anyhow::bail!("no trust anchor locators found in {}", config.tal_directory.display());
    }

    let validator = Validator::build(&config, locators).await?;

    if args.once {
        let results = validator.scheduler.run_all(args.force_fetch).await;
        validator.close().await;

        let summary = RunSummary::new(&results);
        if config.logging.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            for trust_anchor in &summary.trust_anchors {
                println!("{}", trust_anchor);
            }
        }
        if !summary.is_success() {
            anyhow::bail!("validation did not succeed for every trust anchor");
        }
        return Ok(());
    }

    validator.scheduler.start();
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    validator.scheduler.shutdown().await;
    validator.close().await;
    Ok(())
}
