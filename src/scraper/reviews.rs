use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::classifier::TraversalContext;
use super::models::{LayoutVariant, ReviewRecord};
use super::pagination::ItemHandle;
use super::selectors::{Field, ReviewNode, SelectorResolver};
use super::stagnation::{ScrollState, StagnationTracker};
use crate::config::ReviewConfig;
use crate::dom::{read_scroll_metrics, DomDriver, ElementRef, Locator, ScrollDirection, SCROLL_BY_JS};
use crate::error::ScrapeResult;
use crate::utils::string_utils::StringUtils;

/// Minimum length for text read through the looser text locators
const MIN_ALTERNATE_TEXT_LEN: usize = 10;

/// Result of scrolling a review panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub variant: LayoutVariant,
    pub steps: u32,
    pub state: ScrollState,
    pub container_found: bool,
}

enum ParsedNode {
    Review(ReviewRecord),
    Nameless,
    End,
}

/// Opens the review tab of a detail panel, scrolls the review list until no
/// more reviews load and parses every rendered review.
pub struct ReviewPaginator {
    driver: Arc<dyn DomDriver>,
    resolver: SelectorResolver,
    settings: ReviewConfig,
    settle_delay: Duration,
}

impl ReviewPaginator {
    pub fn new(driver: Arc<dyn DomDriver>, settings: ReviewConfig, settle_delay: Duration) -> Self {
        Self {
            resolver: SelectorResolver::new(driver.clone(), Duration::from_millis(settings.tab_timeout_ms)),
            driver,
            settings,
            settle_delay,
        }
    }

    pub async fn extract_reviews(
        &self,
        ctx: &mut TraversalContext,
        item: &ItemHandle,
        variant: LayoutVariant,
    ) -> Vec<ReviewRecord> {
        if !self.open_reviews_tab(item).await {
            return Vec::new();
        }

        let report = self.scroll_to_exhaustion(ctx, variant).await;
        debug!(
            "Review panel of item {} scrolled {} times ({:?})",
            item.index, report.steps, report.state
        );

        let reviews = self.collect_reviews(report.variant).await;
        info!("Extracted {} reviews for item {}", reviews.len(), item.index);
        reviews
    }

    /// Click the reviews tab; `false` when it cannot be found or clicked
    pub async fn open_reviews_tab(&self, item: &ItemHandle) -> bool {
        let tab = match self.resolver.resolve(Field::ReviewsTab).await.element() {
            Some(tab) => tab,
            None => {
                warn!("Reviews tab not found for item {}", item.index);
                return false;
            }
        };

        if let Err(e) = self.driver.click(&tab).await {
            warn!("Could not open reviews tab for item {}: {}", item.index, e);
            return false;
        }

        tokio::time::sleep(self.settle_delay).await;
        true
    }

    /// Scroll the review container of `variant` until it stops growing.
    ///
    /// A missing container is retried once with the alternate variant; the
    /// report carries the variant whose container was actually scrolled.
    pub async fn scroll_to_exhaustion(&self, ctx: &mut TraversalContext, variant: LayoutVariant) -> ScrollReport {
        let mut tracker = StagnationTracker::new(self.settings.max_scroll_attempts);
        let mut report = ScrollReport { variant, steps: 0, state: tracker.state(), container_found: false };

        let container = match self.scroll_container(ctx, variant).await {
            Some(container) => container,
            None => {
                let alternate = variant.alternate();
                debug!("No {} review container, trying {}", variant, alternate);
                match self.scroll_container(ctx, alternate).await {
                    Some(container) => {
                        report.variant = alternate;
                        container
                    }
                    None => {
                        warn!("No review scroll container found, extracting visible reviews only");
                        return report;
                    }
                }
            }
        };
        report.container_found = true;

        while !tracker.is_exhausted() {
            report.steps += 1;

            match self.primary_scroll_step(&container).await {
                Ok((grew, at_bottom)) => {
                    if grew {
                        tracker.observe_growth();
                    } else if at_bottom {
                        tracker.exhaust();
                    } else {
                        tracker.observe_stagnation();
                    }
                }
                Err(e) => {
                    debug!("Primary review scroll failed, using script scroll: {}", e);
                    self.alternative_scroll_step(&container).await;
                    tracker.observe_stagnation();
                }
            }
        }

        report.state = tracker.state();
        report
    }

    async fn scroll_container(&self, ctx: &mut TraversalContext, variant: LayoutVariant) -> Option<ElementRef> {
        if let Some(cached) = ctx.cached_container(variant).cloned() {
            if self.driver.is_present(&cached.locator, Duration::ZERO).await {
                return Some(cached);
            }
            debug!("Cached review container {} is gone", cached.locator);
            ctx.forget_container();
        }

        let container = self.resolver.resolve(Field::ReviewContainer(variant)).await.element()?;
        ctx.remember_container(variant, container.clone());
        Some(container)
    }

    /// One metric-checked scroll; returns whether the panel grew and whether it sits at its bottom
    async fn primary_scroll_step(&self, container: &ElementRef) -> ScrapeResult<(bool, bool)> {
        let before = read_scroll_metrics(self.driver.as_ref(), container).await?;
        self.driver
            .scroll(container, ScrollDirection::Down, self.settings.scroll_amount_px)
            .await?;
        tokio::time::sleep(self.settle_delay).await;
        let after = read_scroll_metrics(self.driver.as_ref(), container).await?;

        Ok((after.grew_from(&before), after.at_bottom()))
    }

    async fn alternative_scroll_step(&self, container: &ElementRef) {
        let args = serde_json::json!({ "amount": self.settings.scroll_amount_px });
        if let Err(e) = self.driver.run_script(SCROLL_BY_JS, Some(container), args).await {
            debug!("Script scroll failed: {}", e);
        }
        tokio::time::sleep(self.settle_delay).await;
    }

    /// Parse every rendered review in DOM order
    pub async fn collect_reviews(&self, variant: LayoutVariant) -> Vec<ReviewRecord> {
        let root = self.list_root(variant).await;
        let mut reviews = Vec::new();
        let mut dropped = 0;

        for position in 0.. {
            match self.parse_review(&ReviewNode::new(&root, position)).await {
                ParsedNode::Review(review) => reviews.push(review),
                ParsedNode::Nameless => dropped += 1,
                ParsedNode::End => break,
            }
        }

        if dropped > 0 {
            debug!("Dropped {} reviews without a reviewer name", dropped);
        }
        reviews
    }

    async fn list_root(&self, variant: LayoutVariant) -> Locator {
        match variant {
            LayoutVariant::Scheduling => ReviewNode::list_root(5, 10),
            LayoutVariant::Standard => {
                for base_div in [9, 10] {
                    let root = ReviewNode::list_root(3, base_div);
                    let first = ReviewNode::new(&root, 0);
                    if self.driver.is_present(&first.reviewer_name(), Duration::ZERO).await {
                        return root;
                    }
                }
                ReviewNode::list_root(3, 9)
            }
        }
    }

    async fn parse_review(&self, node: &ReviewNode) -> ParsedNode {
        let name = match self.read_first(&node.reviewer_name()).await {
            Some(name) => name,
            None if self.driver.is_present(&node.reviewer_name(), Duration::ZERO).await => {
                return ParsedNode::Nameless;
            }
            None => return ParsedNode::End,
        };

        let review_date = self.read_first(&node.date()).await.unwrap_or_default();
        let review_text = self.review_text(node).await;
        let photo_urls = self.photo_urls(node).await;
        debug!("Parsed review by {}: {}", name, StringUtils::truncate(&review_text, 60));

        ParsedNode::Review(ReviewRecord { reviewer_name: name, review_text, review_date, photo_urls })
    }

    async fn review_text(&self, node: &ReviewNode) -> String {
        if let Ok(Some(span)) = self.driver.find_one(&node.text_span(), Duration::ZERO).await {
            if let Ok(Some(more)) = self.driver.find_one(&node.see_more(), Duration::ZERO).await {
                match self.driver.click(&more).await {
                    Ok(()) => tokio::time::sleep(Duration::from_millis(self.settings.see_more_delay_ms)).await,
                    Err(e) => debug!("Could not expand review text: {}", e),
                }
            }

            if let Ok(text) = self.driver.read_text(&span).await {
                return StringUtils::normalize(&text);
            }
        }

        for locator in node.alternate_text() {
            if let Some(text) = self.read_first(&locator).await {
                if text.chars().count() > MIN_ALTERNATE_TEXT_LEN {
                    return StringUtils::normalize(&text);
                }
            }
        }

        String::new()
    }

    async fn photo_urls(&self, node: &ReviewNode) -> Vec<String> {
        let buttons = match self.driver.find_all(&node.photo_buttons()).await {
            Ok(buttons) => buttons,
            Err(e) => {
                debug!("Could not list review photos: {}", e);
                return Vec::new();
            }
        };

        let mut urls = Vec::new();
        for button in buttons {
            if let Ok(Some(style)) = self.driver.read_attribute(&button, "style").await {
                if let Some(url) = StringUtils::parse_background_image_url(&style) {
                    urls.push(url);
                }
            }
        }
        urls
    }

    /// Trimmed, non-empty text of the first match of `locator`
    async fn read_first(&self, locator: &Locator) -> Option<String> {
        let element = self.driver.find_one(locator, Duration::ZERO).await.ok()??;
        let text = self.driver.read_text(&element).await.ok()?;
        (!StringUtils::is_blank(&text)).then(|| text.trim().to_string())
    }
}
