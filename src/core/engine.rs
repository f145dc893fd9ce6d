use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::dom::{DomDriver, RELEASE_MEMORY_JS};
use crate::error::{ScrapeError, ScrapeResult};
use crate::export::{BatchCoordinator, FlushTarget};
use crate::logging::LogContext;
use crate::scraper::selectors::item_locator;
use crate::scraper::{
    BusinessRecord, DetailExtractor, EndReason, ItemHandle, LayoutClassifier, LayoutVariant, ListController,
    ListStep, ReviewPaginator, ReviewRow, TraversalContext,
};
use crate::utils::build_search_url;
use crate::{log_error, log_info, log_warn};

/// What a traversal extracts per listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Details and reviews, appended to cumulative files
    Full,
    /// Details only, after a fast preload, written as parts and merged
    Enumerate,
}

/// Counters reported at the end of a traversal
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraversalSummary {
    pub businesses_processed: usize,
    pub reviews_extracted: usize,
    pub standard_records: usize,
    pub scheduling_records: usize,
    pub failed_items: usize,
    pub flush_failures: usize,
    pub end_reason: Option<String>,
    pub artifacts: Vec<PathBuf>,
}

impl TraversalSummary {
    fn count_variant(&mut self, variant: LayoutVariant) {
        match variant {
            LayoutVariant::Standard => self.standard_records += 1,
            LayoutVariant::Scheduling => self.scheduling_records += 1,
        }
    }
}

/// Outer traversal loop: walks the result list, extracts each listing and
/// hands records to the batch coordinators.
pub struct TraversalEngine {
    driver: Arc<dyn DomDriver>,
    config: AppConfig,
    mode: TraversalMode,
    classifier: LayoutClassifier,
    details: DetailExtractor,
    reviews: ReviewPaginator,
    businesses: BatchCoordinator<BusinessRecord>,
    review_rows: BatchCoordinator<ReviewRow>,
    ctx: TraversalContext,
    summary: TraversalSummary,
    log: LogContext,
}

impl TraversalEngine {
    pub fn new(driver: Arc<dyn DomDriver>, config: AppConfig, mode: TraversalMode, log: LogContext) -> Self {
        let export = &config.export;
        let directory = export.output_directory.clone();

        let (business_target, review_target) = match mode {
            TraversalMode::Full => (
                FlushTarget::Append { path: directory.join(format!("{}.csv", export.business_stem)) },
                FlushTarget::Append { path: directory.join(format!("{}.csv", export.reviews_stem)) },
            ),
            TraversalMode::Enumerate => (
                FlushTarget::Parts { directory: directory.clone(), stem: export.business_stem.clone() },
                FlushTarget::Parts { directory, stem: export.reviews_stem.clone() },
            ),
        };

        Self {
            classifier: LayoutClassifier::new(driver.clone(), config.traversal.badge_timeout()),
            details: DetailExtractor::new(driver.clone(), config.traversal.field_timeout()),
            reviews: ReviewPaginator::new(driver.clone(), config.reviews.clone(), config.traversal.settle_delay()),
            businesses: BatchCoordinator::new(business_target, export.batch_size),
            review_rows: BatchCoordinator::new(review_target, export.batch_size),
            ctx: TraversalContext::new(),
            summary: TraversalSummary::default(),
            driver,
            config,
            mode,
            log,
        }
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    pub fn summary(&self) -> &TraversalSummary {
        &self.summary
    }

    /// Search for `term` and traverse every result
    pub async fn run(&mut self, term: &str) -> ScrapeResult<TraversalSummary> {
        let context = self.log.for_operation("traverse");
        let url = build_search_url(&self.config.search.base_url, term, &self.config.search.language)?;
        log_info!(context, "Searching for '{}' ({:?} mode)", term, self.mode);

        self.driver.navigate(url.as_str()).await?;
        self.wait_for_results(term).await?;

        let mut list = ListController::new(self.driver.clone(), self.config.traversal.clone());
        if self.mode == TraversalMode::Enumerate {
            list.preload_fast(self.config.traversal.fast_preload_ceiling).await;
        }

        loop {
            match list.advance_to_next().await {
                ListStep::Item(item) => self.process_item(&item).await,
                ListStep::EndOfList(reason) => {
                    let reason = match reason {
                        EndReason::Sentinel => "end of list",
                        EndReason::Stagnation => "scroll stagnation",
                    };
                    let stopped = context.clone().with_status(reason);
                    log_info!(stopped, "Traversal stopped after {} items", list.cursor().index);
                    self.summary.end_reason = Some(reason.to_string());
                    break;
                }
            }
        }

        self.flush_pending().await;

        let context = context
            .with_status("completed")
            .with_number_field("businesses", self.summary.businesses_processed as i64)
            .with_number_field("reviews", self.summary.reviews_extracted as i64)
            .with_number_field("failed_items", self.summary.failed_items as i64)
            .with_number_field("flush_failures", self.summary.flush_failures as i64);
        log_info!(
            context,
            "Traversal finished: {} standard, {} scheduling records",
            self.summary.standard_records,
            self.summary.scheduling_records
        );

        Ok(self.summary.clone())
    }

    /// Persist whatever is still buffered. Safe to call after an interrupted run.
    pub async fn flush_pending(&mut self) {
        if let Err(e) = self.businesses.flush_final().await {
            self.flush_failed("businesses", &e);
        }
        if let Err(e) = self.review_rows.flush_final().await {
            self.flush_failed("reviews", &e);
        }

        match self.mode {
            TraversalMode::Enumerate => {
                if !self.businesses.parts().is_empty() {
                    match self.businesses.merge_parts(self.config.export.remove_parts).await {
                        Ok(path) => self.summary.artifacts.push(path),
                        Err(e) => self.flush_failed("merge", &e),
                    }
                }
            }
            TraversalMode::Full => {
                for (target, flushed) in [
                    (self.businesses.target(), self.businesses.flushed_records()),
                    (self.review_rows.target(), self.review_rows.flushed_records()),
                ] {
                    if let FlushTarget::Append { path } = target {
                        if flushed > 0 && !self.summary.artifacts.contains(path) {
                            self.summary.artifacts.push(path.clone());
                        }
                    }
                }
            }
        }
    }

    async fn wait_for_results(&self, term: &str) -> ScrapeResult<()> {
        let timeout = std::time::Duration::from_millis(self.config.search.results_timeout_ms);
        match self.driver.find_one(&item_locator(0), timeout).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ScrapeError::NoResults { term: term.to_string() }),
            Err(e) => {
                debug!("First result lookup failed: {}", e);
                Err(ScrapeError::NoResults { term: term.to_string() })
            }
        }
    }

    async fn process_item(&mut self, item: &ItemHandle) {
        let variant = self.classifier.classify_item(item.index).await;
        let context = self
            .log
            .for_operation("process_item")
            .with_item_index(item.index)
            .with_variant(variant.as_str());

        match self.visit(item, variant).await {
            Ok((record, reviews)) => {
                debug!(fields = ?record.fields(), "Item {} extracted with {} reviews", item.index, reviews.len());
                self.summary.businesses_processed += 1;
                self.summary.reviews_extracted += reviews.len();
                self.summary.count_variant(variant);

                for review in reviews {
                    self.review_rows.add(review);
                }
                self.businesses.add(record);
            }
            Err(e) => {
                self.summary.failed_items += 1;
                let failed = context.with_error_category(e.category());
                if e.is_recoverable() {
                    log_warn!(failed, "Skipping item {}: {}", item.index, e);
                } else {
                    log_error!(failed, "Unexpected failure on item {}: {}", item.index, e);
                }
            }
        }

        if let Err(e) = self.driver.run_script(RELEASE_MEMORY_JS, None, serde_json::Value::Null).await {
            debug!("Memory release script failed: {}", e);
        }

        if let Err(e) = self.businesses.flush_if_threshold().await {
            self.flush_failed("businesses", &e);
        }
        if let Err(e) = self.review_rows.flush_if_threshold().await {
            self.flush_failed("reviews", &e);
        }
    }

    async fn visit(
        &mut self,
        item: &ItemHandle,
        variant: LayoutVariant,
    ) -> ScrapeResult<(BusinessRecord, Vec<ReviewRow>)> {
        self.click_with_retry(item).await?;
        tokio::time::sleep(self.config.traversal.settle_delay()).await;

        let record = self.details.extract(item, variant).await;

        if self.mode == TraversalMode::Enumerate {
            return Ok((record, Vec::new()));
        }

        // A booking badge already tells which review layout the panel uses
        let review_variant = match variant {
            LayoutVariant::Scheduling => LayoutVariant::Scheduling,
            LayoutVariant::Standard => self.classifier.classify_reviews(&mut self.ctx).await,
        };

        let rows = self
            .reviews
            .extract_reviews(&mut self.ctx, item, review_variant)
            .await
            .into_iter()
            .map(|review| ReviewRow::new(record.name.clone(), review, record.timestamp.clone()))
            .collect();

        Ok((record, rows))
    }

    async fn click_with_retry(&self, item: &ItemHandle) -> ScrapeResult<()> {
        let retries = self.config.traversal.click_retries.max(1);

        for attempt in 0..retries {
            match self.driver.click(&item.element).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < retries => {
                    let backoff = self.config.traversal.click_backoff(attempt);
                    debug!("Click on item {} failed ({}), retrying in {:?}", item.index, e, backoff);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    debug!("Click on item {} failed after {} attempts: {}", item.index, retries, e);
                }
            }
        }

        Err(ScrapeError::ClickFailed { locator: item.element.locator.to_string() })
    }

    fn flush_failed(&mut self, what: &str, error: &ScrapeError) {
        self.summary.flush_failures += 1;
        let context = self.log.for_operation("flush").with_error_category(error.category());
        log_error!(context, "Failed to persist {}: {}", what, error);
    }
}
