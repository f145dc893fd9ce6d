use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use mapscrape::cli::Cli;
use mapscrape::config::{AppConfig, ConfigOverrides};
use mapscrape::logging::{init_logging, LogContext};
use mapscrape::{log_info, MapScrape, RunOutcome, TraversalMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = run(cli).await?;
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load().await?,
    };
    ConfigOverrides::apply(&mut config);
    cli.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging)?;

    let app = MapScrape::new(config).await?;

    let context = LogContext::new("main", "startup")
        .with_run_id(app.run_id())
        .with_search_term(&cli.search_term);
    log_info!(context, "mapscrape v{} starting", env!("CARGO_PKG_VERSION"));

    let driver = match app.launch().await {
        Ok(driver) => driver,
        Err(e) => {
            error!("Failed to start browser session: {}", e);
            return Ok(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // reviews.enabled = false in the config file also selects enumerate mode
    let mode = if app.config().reviews.enabled { cli.mode() } else { TraversalMode::Enumerate };
    let outcome = app.run(driver, &cli.search_term, mode, shutdown).await;

    match &outcome {
        RunOutcome::Completed(summary) | RunOutcome::Interrupted(summary) => {
            info!(
                "Processed {} businesses ({} reviews, {} failed items, {} flush failures)",
                summary.businesses_processed,
                summary.reviews_extracted,
                summary.failed_items,
                summary.flush_failures
            );
            for artifact in &summary.artifacts {
                info!("Artifact: {}", artifact.display());
            }
        }
        RunOutcome::Failed(e) => error!("Run failed: {}", e),
    }

    Ok(outcome.exit_code())
}
