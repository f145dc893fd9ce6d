//! Playwright-backed [`DomDriver`]. Every primitive is a small script run in
//! the page; elements are re-resolved from their locator on each call.

#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use playwright::api::{Browser, BrowserContext, Page};
#[cfg(feature = "browser")]
use playwright::Playwright;
#[cfg(feature = "browser")]
use serde_json::Value;
#[cfg(feature = "browser")]
use std::time::Duration;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
#[cfg(feature = "browser")]
use crate::dom::{poll_until, DomDriver, ElementRef, Locator, LocatorKind, ScrollDirection};
use crate::error::{ScrapeError, ScrapeResult};

/// Resolves `target` (`{kind, expr, nth}`) to an element or null
#[cfg(feature = "browser")]
const RESOLVE_JS: &str = r#"
const __find = (t) => {
  if (!t) { return null; }
  if (t.kind === 'xpath') {
    const snapshot = document.evaluate(t.expr, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    return t.nth < snapshot.snapshotLength ? snapshot.snapshotItem(t.nth) : null;
  }
  return document.querySelectorAll(t.expr)[t.nth] || null;
};
const __count = (t) => {
  if (t.kind === 'xpath') {
    return document.evaluate(t.expr, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength;
  }
  return document.querySelectorAll(t.expr).length;
};
"#;

#[cfg(feature = "browser")]
const COUNT_JS: &str = "return __count(args.locator);";
#[cfg(feature = "browser")]
const CLICK_JS: &str = "el.scrollIntoView({ block: 'center' }); el.click(); return null;";
#[cfg(feature = "browser")]
const TEXT_JS: &str = "return el.innerText || el.textContent || '';";
#[cfg(feature = "browser")]
const ATTRIBUTE_JS: &str = "return el.getAttribute(args.name);";
#[cfg(feature = "browser")]
const SCROLL_TOP_JS: &str = "el.scrollTop = el.scrollTop + args.amount; return null;";
#[cfg(feature = "browser")]
const LOCATION_JS: &str = "return window.location.href;";

/// Browser session driving a single Chromium page
#[cfg(feature = "browser")]
pub struct BrowserDriver {
    _playwright: Playwright,
    browser: Browser,
    _context: BrowserContext,
    page: Page,
    poll_interval: Duration,
}

// The driver is only used from the single traversal task
#[cfg(feature = "browser")]
unsafe impl Send for BrowserDriver {}
#[cfg(feature = "browser")]
unsafe impl Sync for BrowserDriver {}

#[cfg(feature = "browser")]
fn init_error(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::BrowserInit { message: e.to_string() }
}

#[cfg(feature = "browser")]
impl BrowserDriver {
    /// Launch Chromium and open a page configured from `config`
    pub async fn launch(config: &BrowserConfig, poll_interval: Duration) -> ScrapeResult<Self> {
        info!("Launching browser (headless: {})", config.headless);

        let playwright = Playwright::initialize().await.map_err(init_error)?;
        playwright.prepare().map_err(init_error)?;

        let browser = playwright
            .chromium()
            .launcher()
            .headless(config.headless)
            .launch()
            .await
            .map_err(init_error)?;

        let context = browser
            .context_builder()
            .user_agent(&config.user_agent)
            .viewport(Some(playwright::api::Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
            }))
            .build()
            .await
            .map_err(init_error)?;

        let page = context.new_page().await.map_err(init_error)?;
        page.set_default_timeout(config.default_timeout_ms as u32)
            .await
            .map_err(init_error)?;

        debug!("Browser page ready");

        Ok(Self {
            _playwright: playwright,
            browser,
            _context: context,
            page,
            poll_interval,
        })
    }

    fn target_json(element: Option<&ElementRef>) -> Value {
        match element {
            Some(element) => serde_json::json!({
                "kind": Self::kind_name(&element.locator),
                "expr": element.locator.expr(),
                "nth": element.nth,
            }),
            None => Value::Null,
        }
    }

    fn kind_name(locator: &Locator) -> &'static str {
        match locator.kind {
            LocatorKind::XPath => "xpath",
            LocatorKind::Css => "css",
        }
    }

    /// Wrap `body` so it sees `el`, `args` and the lookup helpers
    fn wrap(body: &str, target: Option<&ElementRef>, args: &Value) -> String {
        format!(
            "(() => {{ {resolve} const target = {target}; const args = {args}; const el = __find(target); \
             if (target && !el) {{ return {{ __stale: true }}; }} {body} }})()",
            resolve = RESOLVE_JS,
            target = Self::target_json(target),
            args = args,
            body = body,
        )
    }

    async fn eval(&self, body: &str, target: Option<&ElementRef>, args: Value) -> ScrapeResult<Value> {
        let script = Self::wrap(body, target, &args);
        let value: Value = self
            .page
            .evaluate::<(), Value>(&script, ())
            .await
            .map_err(|e| ScrapeError::script(e.to_string()))?;

        if value.get("__stale").and_then(Value::as_bool) == Some(true) {
            if let Some(element) = target {
                return Err(ScrapeError::StaleElement { locator: element.locator.to_string() });
            }
        }

        Ok(value)
    }

    async fn count(&self, locator: &Locator) -> ScrapeResult<usize> {
        let args = serde_json::json!({
            "locator": { "kind": Self::kind_name(locator), "expr": locator.expr(), "nth": 0 }
        });
        let value = self.eval(COUNT_JS, None, args).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl DomDriver for BrowserDriver {
    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        debug!("Navigating to {}", url);
        self.page
            .goto_builder(url)
            .goto()
            .await
            .map_err(|e| ScrapeError::Navigation { url: url.to_string(), message: e.to_string() })?;
        Ok(())
    }

    async fn find_one(&self, locator: &Locator, timeout: Duration) -> ScrapeResult<Option<ElementRef>> {
        poll_until(timeout, self.poll_interval, || async move {
            // Lookup failures while the page re-renders count as absent
            match self.count(locator).await {
                Ok(count) if count > 0 => Ok(Some(ElementRef::first(locator.clone()))),
                Ok(_) => Ok(None),
                Err(e) => {
                    debug!("Lookup of {} failed: {}", locator, e);
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn find_all(&self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>> {
        let count = self.count(locator).await?;
        Ok((0..count).map(|nth| ElementRef::new(locator.clone(), nth)).collect())
    }

    async fn click(&self, element: &ElementRef) -> ScrapeResult<()> {
        self.eval(CLICK_JS, Some(element), Value::Null)
            .await
            .map_err(|e| match e {
                ScrapeError::StaleElement { .. } => e,
                _ => ScrapeError::ClickFailed { locator: element.locator.to_string() },
            })?;
        Ok(())
    }

    async fn read_text(&self, element: &ElementRef) -> ScrapeResult<String> {
        let value = self.eval(TEXT_JS, Some(element), Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn read_attribute(&self, element: &ElementRef, name: &str) -> ScrapeResult<Option<String>> {
        let value = self.eval(ATTRIBUTE_JS, Some(element), serde_json::json!({ "name": name })).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn scroll(&self, element: &ElementRef, direction: ScrollDirection, amount: i64) -> ScrapeResult<()> {
        let amount = match direction {
            ScrollDirection::Down => amount,
            ScrollDirection::Up => -amount,
        };
        self.eval(SCROLL_TOP_JS, Some(element), serde_json::json!({ "amount": amount })).await?;
        Ok(())
    }

    async fn current_location(&self) -> ScrapeResult<String> {
        let value = self.eval(LOCATION_JS, None, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn run_script(&self, script: &str, target: Option<&ElementRef>, args: Value) -> ScrapeResult<Value> {
        self.eval(script, target, args).await
    }

    async fn close(&self) -> ScrapeResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
            return Err(ScrapeError::automation(e.to_string()));
        }
        info!("Browser closed");
        Ok(())
    }
}

/// Launch a browser session behind the [`DomDriver`] boundary
#[cfg(feature = "browser")]
pub async fn launch_driver(
    config: &BrowserConfig,
    poll_interval: Duration,
) -> ScrapeResult<std::sync::Arc<dyn DomDriver>> {
    Ok(std::sync::Arc::new(BrowserDriver::launch(config, poll_interval).await?))
}

// Stub implementation when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub async fn launch_driver(
    _config: &BrowserConfig,
    _poll_interval: std::time::Duration,
) -> ScrapeResult<std::sync::Arc<dyn crate::dom::DomDriver>> {
    Err(ScrapeError::BrowserInit {
        message: "Browser feature not enabled; rebuild with --features browser".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_launch_without_feature_is_init_error() {
        let result = launch_driver(&BrowserConfig::default(), std::time::Duration::from_millis(100)).await;
        match result {
            Err(error) => assert_eq!(error.category(), "initialization"),
            Ok(_) => panic!("launch must fail without the browser feature"),
        }
    }

    #[cfg(feature = "browser")]
    #[test]
    fn test_wrapped_script_embeds_target() {
        let element = ElementRef::new(Locator::css("h1.title"), 2);
        let script = BrowserDriver::wrap(TEXT_JS, Some(&element), &serde_json::json!({ "name": "href" }));

        assert!(script.starts_with("(() => {"));
        assert!(script.contains(r#""expr":"h1.title""#));
        assert!(script.contains(r#""nth":2"#));
        assert!(script.ends_with("})()"));
    }
}
