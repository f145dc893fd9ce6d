use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub mod engine;

pub use engine::{TraversalEngine, TraversalMode, TraversalSummary};

use crate::config::AppConfig;
use crate::dom::DomDriver;
use crate::error::{ScrapeError, ScrapeResult};
use crate::logging::{LogContext, RunIdGenerator};
use crate::scraper::browser::launch_driver;
use crate::utils::format_duration;
use crate::{log_error, log_info, log_warn};

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(TraversalSummary),
    Interrupted(TraversalSummary),
    Failed(ScrapeError),
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(_) => 0,
            Self::Failed(_) => 1,
            Self::Interrupted(_) => 130,
        }
    }
}

/// Core application: owns the configuration and the lifetime of one
/// automation session per run.
pub struct MapScrape {
    config: AppConfig,
    run_id: String,
}

impl MapScrape {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing mapscrape core");

        config.ensure_directories().await?;

        Ok(Self {
            config,
            run_id: RunIdGenerator::generate(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Launch a browser session configured from `config.browser`
    pub async fn launch(&self) -> ScrapeResult<Arc<dyn DomDriver>> {
        launch_driver(&self.config.browser, self.config.traversal.poll_interval()).await
    }

    /// Traverse the results for `term` until done or until `shutdown` resolves.
    /// Pending records are flushed on interruption and the session is always closed.
    pub async fn run<S>(&self, driver: Arc<dyn DomDriver>, term: &str, mode: TraversalMode, shutdown: S) -> RunOutcome
    where
        S: Future<Output = ()>,
    {
        let context = LogContext::new("core", "run")
            .with_run_id(&self.run_id)
            .with_search_term(term);

        let started = Instant::now();
        let mut engine = TraversalEngine::new(driver.clone(), self.config.clone(), mode, context.clone());

        let finished = tokio::select! {
            biased;
            _ = shutdown => None,
            result = engine.run(term) => Some(result),
        };

        let outcome = match finished {
            Some(Ok(summary)) => RunOutcome::Completed(summary),
            Some(Err(e)) => {
                let failed = context.clone().with_error_category(e.category());
                log_error!(failed, "Traversal failed: {}", e);
                RunOutcome::Failed(e)
            }
            None => {
                let interrupted = context.clone().with_status("interrupted");
                log_warn!(interrupted, "Interrupted, flushing pending records");
                engine.flush_pending().await;
                RunOutcome::Interrupted(engine.summary().clone())
            }
        };

        if let Err(e) = driver.close().await {
            warn!("Session teardown failed: {}", e);
        }

        let closed = context.with_status("closed");
        log_info!(
            closed,
            "Run finished in {} with exit code {}",
            format_duration(started.elapsed()),
            outcome.exit_code()
        );
        outcome
    }
}
