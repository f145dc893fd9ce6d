//! Boundary to the browser automation runtime.
//!
//! Everything the traversal engine knows about the page goes through
//! [`DomDriver`]. Elements are addressed by [`ElementRef`], a locator plus the
//! position of the match, so a reference can be re-resolved after the page
//! re-renders.

use async_trait::async_trait;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{ScrapeError, ScrapeResult};

#[cfg(test)]
pub mod testing;

/// Script returning the scroll geometry of the target element
pub const SCROLL_METRICS_JS: &str =
    "return { scrollHeight: el.scrollHeight, scrollTop: el.scrollTop, clientHeight: el.clientHeight };";

/// Script scrolling the target element by `args.amount` pixels
pub const SCROLL_BY_JS: &str = "el.scrollBy(0, args.amount); return null;";

/// Script asking the page to release memory where the engine exposes it
pub const RELEASE_MEMORY_JS: &str = "window.gc && window.gc(); return null;";

/// Locator query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    XPath,
    Css,
}

/// A query that locates zero or more elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub kind: LocatorKind,
    expr: Cow<'static, str>,
}

impl Locator {
    pub const fn xpath(expr: &'static str) -> Self {
        Self { kind: LocatorKind::XPath, expr: Cow::Borrowed(expr) }
    }

    pub const fn css(expr: &'static str) -> Self {
        Self { kind: LocatorKind::Css, expr: Cow::Borrowed(expr) }
    }

    pub fn xpath_owned(expr: impl Into<String>) -> Self {
        Self { kind: LocatorKind::XPath, expr: Cow::Owned(expr.into()) }
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Append a relative XPath step to this locator
    pub fn join(&self, suffix: &str) -> Self {
        Self::xpath_owned(format!("{}{}", self.expr, suffix))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::XPath => write!(f, "xpath={}", self.expr),
            LocatorKind::Css => write!(f, "css={}", self.expr),
        }
    }
}

/// Handle to the `nth` element matched by `locator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub locator: Locator,
    pub nth: usize,
}

impl ElementRef {
    pub fn new(locator: Locator, nth: usize) -> Self {
        Self { locator, nth }
    }

    pub fn first(locator: Locator) -> Self {
        Self::new(locator, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Scroll geometry of a scrollable element
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Tolerance in pixels when deciding that a panel sits at its bottom
    pub const BOTTOM_TOLERANCE: f64 = 10.0;

    /// Content height or scroll offset increased since `before`
    pub fn grew_from(&self, before: &ScrollMetrics) -> bool {
        self.scroll_height > before.scroll_height || self.scroll_top > before.scroll_top
    }

    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - Self::BOTTOM_TOLERANCE
    }
}

/// Browser automation primitives consumed by the traversal engine.
///
/// Lookups with a timeout poll until the element shows up or the deadline
/// passes; a zero timeout probes exactly once.
#[async_trait]
pub trait DomDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> ScrapeResult<()>;

    async fn find_one(&self, locator: &Locator, timeout: Duration) -> ScrapeResult<Option<ElementRef>>;

    async fn find_all(&self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>>;

    async fn is_present(&self, locator: &Locator, timeout: Duration) -> bool {
        matches!(self.find_one(locator, timeout).await, Ok(Some(_)))
    }

    async fn click(&self, element: &ElementRef) -> ScrapeResult<()>;

    async fn read_text(&self, element: &ElementRef) -> ScrapeResult<String>;

    async fn read_attribute(&self, element: &ElementRef, name: &str) -> ScrapeResult<Option<String>>;

    async fn scroll(&self, element: &ElementRef, direction: ScrollDirection, amount: i64) -> ScrapeResult<()>;

    async fn current_location(&self) -> ScrapeResult<String>;

    /// Run `script` with `el` bound to the resolved target and `args` to the given JSON
    async fn run_script(
        &self,
        script: &str,
        target: Option<&ElementRef>,
        args: serde_json::Value,
    ) -> ScrapeResult<serde_json::Value>;

    async fn close(&self) -> ScrapeResult<()>;
}

/// Read the scroll geometry of `element`
pub async fn read_scroll_metrics(driver: &dyn DomDriver, element: &ElementRef) -> ScrapeResult<ScrollMetrics> {
    let value = driver
        .run_script(SCROLL_METRICS_JS, Some(element), serde_json::Value::Null)
        .await?;

    serde_json::from_value(value)
        .map_err(|e| ScrapeError::script(format!("Unexpected scroll metrics for {}: {}", element.locator, e)))
}

/// Poll `probe` until it yields a value or `timeout` elapses
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> ScrapeResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ScrapeResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(found) = probe().await? {
            return Ok(Some(found));
        }

        if Instant::now() >= deadline {
            return Ok(None);
        }

        tokio::time::sleep(interval).await;
    }
}
