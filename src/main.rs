use anyhow::{bail, Context, Result};
use clap::Parser;
use config_manager::SystemConfig;
use job_orchestrator::PortfolioService;
use portfolio_core::{normalize_address, AggregatedPortfolio};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Fetch a wallet's holdings across EVM chains and print the merged portfolio
#[derive(Parser, Debug)]
#[command(name = "portfolio_tracker", version)]
struct Cli {
    /// Wallet address (0x + 40 hex characters)
    address: String,

    /// Chains to fetch; all configured chains when omitted
    chain_ids: Vec<u64>,

    /// Configuration file
    #[arg(long, default_value = "config.toml", env = "PORTFOLIO_CONFIG")]
    config: PathBuf,

    /// Give up waiting for queued chains after this many seconds
    #[arg(long, default_value_t = 300)]
    wait_seconds: u64,

    /// Interval between aggregate polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,
}

fn init_tracing(config: &SystemConfig) {
    let default_filter = if config.system.debug_mode {
        "info,job_orchestrator=debug,goldrush_client=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.system.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SystemConfig::load_from_path(&cli.config).context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting portfolio tracker...");
    info!("Configuration: {}", config.to_redacted_json());

    let address = normalize_address(&cli.address)?;

    let (service, worker) = PortfolioService::from_config(&config).await?;
    info!("✅ Pipeline ready with {} chains", service.chains().len());

    let submitted = if cli.chain_ids.is_empty() {
        service.submit_all(&address).await?
    } else {
        let mut jobs = Vec::with_capacity(cli.chain_ids.len());
        for chain_id in &cli.chain_ids {
            jobs.push(service.submit_one(*chain_id, &address).await?);
        }
        jobs
    };
    for job in &submitted {
        info!("📡 Chain {} queued as {}", job.chain_id, job.request_id);
    }

    let portfolio = wait_for_results(
        &service,
        &address,
        Duration::from_secs(cli.wait_seconds),
        Duration::from_millis(cli.poll_ms),
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&portfolio)?);

    worker.shutdown().await;
    Ok(())
}

/// Poll the aggregate until every submitted chain has settled or the deadline passes
async fn wait_for_results(
    service: &PortfolioService,
    address: &str,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<AggregatedPortfolio> {
    let deadline = Instant::now() + max_wait;

    loop {
        let portfolio = service.aggregate(address).await?;
        if portfolio.is_settled() {
            info!(
                "✅ Portfolio settled: ${} across {} positions",
                portfolio.total_value_usd,
                portfolio.positions.len()
            );
            return Ok(portfolio);
        }

        if Instant::now() >= deadline {
            warn!(
                "⚠️ Gave up waiting with {} chains still queued ({} jobs in queue)",
                portfolio.count_by_status(portfolio_core::ChainStatus::Queued),
                service.queue_depth()
            );
            if portfolio.count_by_status(portfolio_core::ChainStatus::Completed) == 0 {
                bail!("No chain completed within {}s", max_wait.as_secs());
            }
            return Ok(portfolio);
        }

        sleep(poll_interval).await;
    }
}
