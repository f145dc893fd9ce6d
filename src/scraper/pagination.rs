use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::selectors::{item_locator, END_OF_LIST, LOADED_ITEMS, RESULTS_PANEL};
use super::stagnation::{ScrollState, StagnationTracker};
use crate::config::TraversalConfig;
use crate::dom::{DomDriver, ElementRef, ScrollDirection, SCROLL_BY_JS};

/// Position of the traversal in the result list
#[derive(Debug, Clone)]
pub struct ListCursor {
    pub index: usize,
    pub last_known_count: usize,
    pub end_of_list_seen: bool,
    stagnation: StagnationTracker,
}

impl ListCursor {
    pub fn new(max_scroll_attempts: u32) -> Self {
        Self {
            index: 0,
            last_known_count: 0,
            end_of_list_seen: false,
            stagnation: StagnationTracker::new(max_scroll_attempts),
        }
    }

    pub fn scroll_attempts(&self) -> u32 {
        self.stagnation.attempts()
    }

    pub fn max_scroll_attempts(&self) -> u32 {
        self.stagnation.max_attempts()
    }
}

/// A result the traversal should visit
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHandle {
    pub index: usize,
    pub element: ElementRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Sentinel,
    Stagnation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListStep {
    Item(ItemHandle),
    EndOfList(EndReason),
}

/// Outcome of a fast preload pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadOutcome {
    pub iterations: u32,
    pub sentinel_seen: bool,
    pub loaded: usize,
}

/// Walks the virtualized result list, scrolling it whenever the cursor
/// outruns the rendered items.
pub struct ListController {
    driver: Arc<dyn DomDriver>,
    cursor: ListCursor,
    settings: TraversalConfig,
}

impl ListController {
    pub fn new(driver: Arc<dyn DomDriver>, settings: TraversalConfig) -> Self {
        Self {
            driver,
            cursor: ListCursor::new(settings.max_scroll_attempts),
            settings,
        }
    }

    pub fn cursor(&self) -> &ListCursor {
        &self.cursor
    }

    /// Number of results rendered in the panel
    pub async fn loaded_count(&self) -> usize {
        match self.driver.find_all(&LOADED_ITEMS).await {
            Ok(items) => items.len(),
            Err(e) => {
                debug!("Could not count loaded items: {}", e);
                self.cursor.last_known_count
            }
        }
    }

    /// Produce the next item or report that the list is exhausted
    pub async fn advance_to_next(&mut self) -> ListStep {
        loop {
            let index = self.cursor.index;

            if let Some(element) = self.probe_item(index, self.settings.item_probe_timeout()).await {
                return self.emit(index, element);
            }

            if self.cursor.stagnation.is_exhausted() {
                return ListStep::EndOfList(EndReason::Stagnation);
            }

            if self.cursor.end_of_list_seen || self.driver.is_present(&END_OF_LIST, Duration::ZERO).await {
                self.cursor.end_of_list_seen = true;

                // The last items can render together with the sentinel
                if let Some(element) = self.probe_item(index, Duration::ZERO).await {
                    return self.emit(index, element);
                }

                info!("Reached end of list after {} items", index);
                return ListStep::EndOfList(EndReason::Sentinel);
            }

            if self.scroll_and_measure().await {
                self.cursor.stagnation.observe_growth();
                debug!("List grew to {} items", self.cursor.last_known_count);
            } else if self.cursor.stagnation.observe_stagnation() == ScrollState::Exhausted {
                info!(
                    "No new items after {} scroll attempts, stopping at {} items",
                    self.cursor.max_scroll_attempts(),
                    index
                );
                return ListStep::EndOfList(EndReason::Stagnation);
            } else {
                debug!(
                    "Scroll attempt {}/{} produced no new items",
                    self.cursor.scroll_attempts(),
                    self.cursor.max_scroll_attempts()
                );
            }
        }
    }

    /// Scroll the result panel without settle delays until the sentinel shows
    /// up or `ceiling` iterations have run.
    pub async fn preload_fast(&mut self, ceiling: u32) -> PreloadOutcome {
        let mut outcome = PreloadOutcome { iterations: 0, sentinel_seen: false, loaded: 0 };

        let panel = match self.driver.find_one(&RESULTS_PANEL, self.settings.item_probe_timeout()).await {
            Ok(Some(panel)) => panel,
            Ok(None) => {
                warn!("Result panel not found, skipping preload");
                outcome.loaded = self.loaded_count().await;
                return outcome;
            }
            Err(e) => {
                warn!("Result panel lookup failed, skipping preload: {}", e);
                outcome.loaded = self.loaded_count().await;
                return outcome;
            }
        };

        let args = serde_json::json!({ "amount": self.settings.scroll_amount_px });

        while outcome.iterations < ceiling {
            if self.driver.is_present(&END_OF_LIST, Duration::ZERO).await {
                outcome.sentinel_seen = true;
                break;
            }

            if let Err(e) = self.driver.run_script(SCROLL_BY_JS, Some(&panel), args.clone()).await {
                warn!("Preload scroll failed after {} iterations: {}", outcome.iterations, e);
                break;
            }

            outcome.iterations += 1;
        }

        if !outcome.sentinel_seen && outcome.iterations >= ceiling {
            warn!("Preload stopped at iteration ceiling {}", ceiling);
        }

        self.cursor.end_of_list_seen |= outcome.sentinel_seen;
        outcome.loaded = self.loaded_count().await;
        self.cursor.last_known_count = outcome.loaded;

        info!("Preloaded {} items in {} scroll iterations", outcome.loaded, outcome.iterations);
        outcome
    }

    /// An item past the last known count means the list grew, even when it
    /// rendered after the scroll was measured
    fn emit(&mut self, index: usize, element: ElementRef) -> ListStep {
        if index >= self.cursor.last_known_count {
            self.cursor.last_known_count = index + 1;
            self.cursor.stagnation.observe_growth();
        }
        self.cursor.index = index + 1;
        ListStep::Item(ItemHandle { index, element })
    }

    async fn probe_item(&self, index: usize, timeout: Duration) -> Option<ElementRef> {
        match self.driver.find_one(&item_locator(index), timeout).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Probe for item {} failed: {}", index, e);
                None
            }
        }
    }

    /// Scroll the result panel once and report whether the rendered count
    /// passed the last known count. A failed scroll counts as no growth.
    async fn scroll_and_measure(&mut self) -> bool {
        let before = self.cursor.last_known_count;

        let panel = match self.driver.find_one(&RESULTS_PANEL, Duration::ZERO).await {
            Ok(Some(panel)) => panel,
            Ok(None) => {
                debug!("Result panel missing, cannot scroll");
                return false;
            }
            Err(e) => {
                debug!("Result panel lookup failed: {}", e);
                return false;
            }
        };

        if let Err(e) = self
            .driver
            .scroll(&panel, ScrollDirection::Down, self.settings.scroll_amount_px)
            .await
        {
            debug!("Result panel scroll failed: {}", e);
            return false;
        }

        tokio::time::sleep(self.settings.settle_delay()).await;

        let after = self.loaded_count().await;
        self.cursor.last_known_count = before.max(after);
        after > before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::testing::{FakeDom, FakeNode, FakeState};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn settings() -> TraversalConfig {
        TraversalConfig {
            settle_delay_ms: 0,
            item_probe_timeout_ms: 0,
            ..TraversalConfig::default()
        }
    }

    fn render_items(state: &mut FakeState, count: usize) {
        for index in 0..count {
            state.set_one(item_locator(index).expr(), FakeNode::text(format!("Result {}", index)));
        }
        state.set(LOADED_ITEMS.expr(), vec![FakeNode::default(); count]);
    }

    async fn drain(controller: &mut ListController) -> (Vec<usize>, EndReason) {
        let mut visited = Vec::new();
        loop {
            match controller.advance_to_next().await {
                ListStep::Item(handle) => visited.push(handle.index),
                ListStep::EndOfList(reason) => return (visited, reason),
            }
        }
    }

    #[tokio::test]
    async fn test_stops_at_sentinel_without_scrolling() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| {
            render_items(state, 2);
            state.set_one(END_OF_LIST.expr(), FakeNode::text("You've reached the end of the list."));
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let (visited, reason) = drain(&mut controller).await;

        assert_eq!(visited, vec![0, 1]);
        assert_eq!(reason, EndReason::Sentinel);
        assert!(controller.cursor().end_of_list_seen);
        assert_eq!(controller.cursor().index, 2);
    }

    #[tokio::test]
    async fn test_growth_resets_then_stagnation_halts() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| {
            render_items(state, 2);
            state.set_one(RESULTS_PANEL.expr(), FakeNode::default());
        });

        let scrolls = Arc::new(AtomicUsize::new(0));
        let counter = scrolls.clone();
        dom.on_scroll(move |state, _| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= 2 {
                render_items(state, 2 + 2 * attempt);
            }
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let (visited, reason) = drain(&mut controller).await;

        assert_eq!(visited, (0..6).collect::<Vec<_>>());
        assert_eq!(reason, EndReason::Stagnation);
        assert_eq!(controller.cursor().index, 6);
        assert_eq!(controller.cursor().scroll_attempts(), 3);
        // Two growing scrolls followed by exactly three stagnant ones
        assert_eq!(scrolls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_late_rendered_items_reset_stagnation() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| {
            render_items(state, 2);
            state.set_one(RESULTS_PANEL.expr(), FakeNode::default());
        });

        // Each scroll loads two more items, but they only render once the
        // next item lookup is already waiting
        let scrolled = Arc::new(AtomicBool::new(false));
        let flag = scrolled.clone();
        dom.on_scroll(move |_, _| flag.store(true, Ordering::SeqCst));

        let mut rendered = 2;
        dom.on_find(move |state, _| {
            if scrolled.swap(false, Ordering::SeqCst) && rendered < 10 {
                rendered += 2;
                render_items(state, rendered);
            }
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let (visited, reason) = drain(&mut controller).await;

        assert_eq!(visited, (0..10).collect::<Vec<_>>());
        assert_eq!(reason, EndReason::Stagnation);
        assert_eq!(controller.cursor().last_known_count, 10);
    }

    #[tokio::test]
    async fn test_item_rendered_with_sentinel_is_emitted() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| render_items(state, 2));

        // The third item shows up together with the end-of-list marker
        let sentinel = END_OF_LIST.expr().to_string();
        dom.on_find(move |state, element| {
            if element.locator.expr() == sentinel && !state.nodes.contains_key(&sentinel) {
                render_items(state, 3);
                state.set_one(sentinel.clone(), FakeNode::text("You've reached the end of the list."));
            }
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let (visited, reason) = drain(&mut controller).await;

        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(reason, EndReason::Sentinel);
        assert_eq!(controller.cursor().index, 3);
        assert_eq!(dom.with_state(|state| state.probe_count(&item_locator(2).expr().to_string())), 2);
    }

    #[tokio::test]
    async fn test_scroll_failure_counts_as_no_growth() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| {
            render_items(state, 1);
            state.set_one(RESULTS_PANEL.expr(), FakeNode::default());
            state.failing_scrolls = 10;
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let (visited, reason) = drain(&mut controller).await;

        assert_eq!(visited, vec![0]);
        assert_eq!(reason, EndReason::Stagnation);
        assert_eq!(dom.with_state(|state| state.failing_scrolls), 7);
    }

    #[tokio::test]
    async fn test_preload_stops_at_sentinel() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| {
            render_items(state, 3);
            state.set_one(RESULTS_PANEL.expr(), FakeNode::default());
        });

        let scrolls = Arc::new(AtomicUsize::new(0));
        let counter = scrolls.clone();
        dom.on_scroll(move |state, _| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 4 {
                render_items(state, 12);
                state.set_one(END_OF_LIST.expr(), FakeNode::text("You've reached the end of the list."));
            }
        });

        let mut controller = ListController::new(dom.clone(), settings());
        let outcome = controller.preload_fast(10_000).await;

        assert_eq!(outcome, PreloadOutcome { iterations: 4, sentinel_seen: true, loaded: 12 });

        // Items already rendered are still visited after the sentinel was seen
        let (visited, reason) = drain(&mut controller).await;
        assert_eq!(visited.len(), 12);
        assert_eq!(reason, EndReason::Sentinel);
    }

    #[tokio::test]
    async fn test_preload_respects_ceiling() {
        let dom = Arc::new(FakeDom::new());
        dom.with_state(|state| state.set_one(RESULTS_PANEL.expr(), FakeNode::default()));

        let mut controller = ListController::new(dom.clone(), settings());
        let outcome = controller.preload_fast(25).await;

        assert_eq!(outcome.iterations, 25);
        assert!(!outcome.sentinel_seen);
    }
}
