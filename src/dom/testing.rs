//! In-memory [`DomDriver`] for exercising the traversal engine without a browser.
//!
//! Nodes are keyed by the exact locator expression that finds them. Hooks let a
//! test mutate the page in response to clicks, scrolls and lookups.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{
    DomDriver, ElementRef, Locator, ScrollDirection, ScrollMetrics, RELEASE_MEMORY_JS, SCROLL_BY_JS,
    SCROLL_METRICS_JS,
};
use crate::error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

impl FakeNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), attrs: HashMap::new() }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub nodes: HashMap<String, Vec<FakeNode>>,
    pub metrics: HashMap<String, ScrollMetrics>,
    pub location: String,
    pub probes: HashMap<String, usize>,
    pub waits: HashMap<String, Duration>,
    pub clicks: Vec<String>,
    pub scripts: Vec<String>,
    pub navigations: Vec<String>,
    pub failing_scrolls: usize,
    pub closed: bool,
}

impl FakeState {
    pub fn set(&mut self, expr: impl Into<String>, nodes: Vec<FakeNode>) {
        self.nodes.insert(expr.into(), nodes);
    }

    pub fn set_one(&mut self, expr: impl Into<String>, node: FakeNode) {
        self.set(expr, vec![node]);
    }

    pub fn remove(&mut self, expr: &str) {
        self.nodes.remove(expr);
    }

    pub fn probe_count(&self, expr: &str) -> usize {
        self.probes.get(expr).copied().unwrap_or(0)
    }

    fn node(&self, element: &ElementRef) -> ScrapeResult<&FakeNode> {
        self.nodes
            .get(element.locator.expr())
            .and_then(|nodes| nodes.get(element.nth))
            .ok_or_else(|| ScrapeError::StaleElement { locator: element.locator.to_string() })
    }
}

type Hook = Box<dyn FnMut(&mut FakeState, &ElementRef) + Send>;

#[derive(Default)]
pub struct FakeDom {
    state: Mutex<FakeState>,
    on_click: Mutex<Option<Hook>>,
    on_scroll: Mutex<Option<Hook>>,
    on_find: Mutex<Option<Hook>>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the page state directly
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn on_click(&self, hook: impl FnMut(&mut FakeState, &ElementRef) + Send + 'static) {
        *self.on_click.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn on_scroll(&self, hook: impl FnMut(&mut FakeState, &ElementRef) + Send + 'static) {
        *self.on_scroll.lock().unwrap() = Some(Box::new(hook));
    }

    /// Runs before every `find_one`, e.g. to render content while a lookup waits
    pub fn on_find(&self, hook: impl FnMut(&mut FakeState, &ElementRef) + Send + 'static) {
        *self.on_find.lock().unwrap() = Some(Box::new(hook));
    }

    fn fire(&self, hook: &Mutex<Option<Hook>>, element: &ElementRef) {
        let mut hook = hook.lock().unwrap();
        if let Some(hook) = hook.as_mut() {
            let mut state = self.state.lock().unwrap();
            hook(&mut state, element);
        }
    }

    fn lookup(&self, locator: &Locator) -> usize {
        let mut state = self.state.lock().unwrap();
        *state.probes.entry(locator.expr().to_string()).or_insert(0) += 1;
        state.nodes.get(locator.expr()).map(|nodes| nodes.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DomDriver for FakeDom {
    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        self.with_state(|state| {
            state.navigations.push(url.to_string());
            state.location = url.to_string();
        });
        Ok(())
    }

    async fn find_one(&self, locator: &Locator, timeout: Duration) -> ScrapeResult<Option<ElementRef>> {
        self.with_state(|state| state.waits.insert(locator.expr().to_string(), timeout));
        self.fire(&self.on_find, &ElementRef::first(locator.clone()));
        if self.lookup(locator) > 0 {
            Ok(Some(ElementRef::first(locator.clone())))
        } else {
            Ok(None)
        }
    }

    async fn find_all(&self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>> {
        let count = self.lookup(locator);
        Ok((0..count).map(|nth| ElementRef::new(locator.clone(), nth)).collect())
    }

    async fn click(&self, element: &ElementRef) -> ScrapeResult<()> {
        self.with_state(|state| {
            state.node(element)?;
            state.clicks.push(element.locator.expr().to_string());
            Ok::<(), ScrapeError>(())
        })?;
        self.fire(&self.on_click, element);
        Ok(())
    }

    async fn read_text(&self, element: &ElementRef) -> ScrapeResult<String> {
        self.with_state(|state| state.node(element).map(|node| node.text.clone()))
    }

    async fn read_attribute(&self, element: &ElementRef, name: &str) -> ScrapeResult<Option<String>> {
        self.with_state(|state| state.node(element).map(|node| node.attrs.get(name).cloned()))
    }

    async fn scroll(&self, element: &ElementRef, _direction: ScrollDirection, _amount: i64) -> ScrapeResult<()> {
        self.with_state(|state| {
            state.node(element)?;
            if state.failing_scrolls > 0 {
                state.failing_scrolls -= 1;
                return Err(ScrapeError::script("scroll rejected"));
            }
            Ok(())
        })?;
        self.fire(&self.on_scroll, element);
        Ok(())
    }

    async fn current_location(&self) -> ScrapeResult<String> {
        Ok(self.with_state(|state| state.location.clone()))
    }

    async fn run_script(
        &self,
        script: &str,
        target: Option<&ElementRef>,
        _args: serde_json::Value,
    ) -> ScrapeResult<serde_json::Value> {
        self.with_state(|state| state.scripts.push(script.to_string()));

        match (script, target) {
            (SCROLL_METRICS_JS, Some(element)) => self.with_state(|state| {
                state.node(element)?;
                let metrics = state.metrics.get(element.locator.expr()).copied().unwrap_or_default();
                Ok(serde_json::json!({
                    "scrollHeight": metrics.scroll_height,
                    "scrollTop": metrics.scroll_top,
                    "clientHeight": metrics.client_height,
                }))
            }),
            (SCROLL_BY_JS, Some(element)) => {
                self.with_state(|state| state.node(element).map(|_| ()))?;
                self.fire(&self.on_scroll, element);
                Ok(serde_json::Value::Null)
            }
            (RELEASE_MEMORY_JS, _) => Ok(serde_json::Value::Null),
            _ => Ok(serde_json::Value::Null),
        }
    }

    async fn close(&self) -> ScrapeResult<()> {
        self.with_state(|state| state.closed = true);
        Ok(())
    }
}
