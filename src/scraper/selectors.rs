//! Locators for the results list and detail panel, and the fallback chains
//! used to resolve each extracted field.
//!
//! Every chain starts with the exact structural path and loosens towards
//! class and attribute queries. Chains are fixed at build time.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::models::LayoutVariant;
use crate::dom::{DomDriver, ElementRef, Locator};
use crate::error::ScrapeResult;

macro_rules! results_panel {
    () => {
        "//*[@id='QA0Szd']/div/div/div[1]/div[2]/div/div[1]/div/div/div[1]/div[1]"
    };
}

macro_rules! detail_root {
    () => {
        "//*[@id='QA0Szd']/div/div/div[1]/div[3]/div/div[1]/div/div"
    };
}

/// Scrollable panel holding the result list
pub const RESULTS_PANEL: Locator = Locator::xpath(results_panel!());

/// Every result anchor currently rendered in the panel
pub const LOADED_ITEMS: Locator = Locator::xpath(concat!(results_panel!(), "/div/div/a"));

/// Marker rendered once the list has no further content
pub const END_OF_LIST: Locator = Locator::xpath("//*[contains(text(), \"You've reached the end of the list.\")]");

/// Root of the detail panel opened by clicking a result
pub const DETAIL_ROOT: Locator = Locator::xpath(detail_root!());

/// Structural anchor whose absence hints at a non-standard review panel
pub const REVIEW_ANCHOR: Locator = Locator::xpath(concat!(detail_root!(), "/div[3]"));

/// Indicators that identify a scheduling panel on their own
pub static QUICK_SCHEDULING_PROBES: [Locator; 2] = [Locator::css(".s35xed"), Locator::css("a[href*=\"scheduling\"]")];

/// High-confidence scheduling indicators, weighted 3
pub static PRIMARY_SCHEDULING_PROBES: [Locator; 3] = [
    Locator::css(".s35xed"),
    Locator::css(".faY1Me"),
    Locator::css("a[href*=\"scheduling/patient-lookup\"]"),
];

/// Secondary scheduling indicators, weighted 2
pub static SECONDARY_SCHEDULING_PROBES: [Locator; 2] = [
    Locator::xpath("//a[contains(@href, 'scheduling')]"),
    Locator::xpath("//span[text()='Book online']"),
];

/// Locator of the result anchor at `index`
pub fn item_locator(index: usize) -> Locator {
    Locator::xpath_owned(format!("{}/div[{}]/div/a", results_panel!(), 3 + 2 * index))
}

/// Locator of the booking badge rendered inside the result at `index`
pub fn item_badge_locator(index: usize) -> Locator {
    Locator::xpath_owned(format!(
        "{}/div[{}]/div/div[2]/div[5]/div[4]/div/div/a/div",
        results_panel!(),
        3 + 2 * index
    ))
}

/// Positional locators for one review inside the review list
#[derive(Debug, Clone)]
pub struct ReviewNode {
    base: Locator,
}

impl ReviewNode {
    /// Review list root for a container div and base div
    pub fn list_root(container_div: usize, base_div: usize) -> Locator {
        Locator::xpath_owned(format!("{}/div[{}]/div[{}]", detail_root!(), container_div, base_div))
    }

    pub fn new(list_root: &Locator, position: usize) -> Self {
        Self {
            base: list_root.join(&format!("/div[{}]", 1 + 4 * position)),
        }
    }

    pub fn reviewer_name(&self) -> Locator {
        self.base.join("/div/div/div[2]/div[2]/div[1]/button/div[1]")
    }

    pub fn date(&self) -> Locator {
        self.base.join("/div/div/div[4]/div[1]/span[2]")
    }

    pub fn text_container(&self) -> Locator {
        self.base.join("/div/div/div[4]/div[2]")
    }

    pub fn text_span(&self) -> Locator {
        self.text_container().join("//span[@class='wiI7pd']")
    }

    pub fn see_more(&self) -> Locator {
        self.text_container().join("//button[@aria-label='See more']")
    }

    /// Looser text locators tried when the main span is missing
    pub fn alternate_text(&self) -> [Locator; 3] {
        let container = self.text_container();
        [container.join("/span"), container.join("/div/span"), container.join("//span")]
    }

    pub fn photo_buttons(&self) -> Locator {
        self.base.join("/div/div/div[4]/div[3]/button")
    }
}

/// How a matched element yields its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    Presence,
    Text,
    Attribute(&'static str),
}

/// Acceptance rule applied to a read value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    NonEmpty,
    Contains(&'static str),
    StartsWith(&'static str),
    LeadingNumber,
}

impl Accept {
    pub fn accepts(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }

        match self {
            Self::NonEmpty => true,
            Self::Contains(needle) => value.contains(needle),
            Self::StartsWith(prefix) => value.starts_with(prefix),
            Self::LeadingNumber => value.chars().next().is_some_and(|c| c.is_ascii_digit()),
        }
    }
}

/// Which matches of a locator are considered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    First,
    All,
}

/// One attempt in a fallback chain
#[derive(Debug, Clone)]
pub struct Strategy {
    pub locator: Locator,
    pub read: Read,
    pub accept: Accept,
    pub scan: Scan,
}

impl Strategy {
    pub const fn text(locator: Locator) -> Self {
        Self { locator, read: Read::Text, accept: Accept::NonEmpty, scan: Scan::First }
    }

    pub const fn attribute(locator: Locator, name: &'static str, accept: Accept) -> Self {
        Self { locator, read: Read::Attribute(name), accept, scan: Scan::First }
    }

    pub const fn presence(locator: Locator) -> Self {
        Self { locator, read: Read::Presence, accept: Accept::NonEmpty, scan: Scan::First }
    }

    /// Like [`Strategy::attribute`] but considers every match instead of the first one
    pub const fn scan_attribute(locator: Locator, name: &'static str, accept: Accept) -> Self {
        Self { locator, read: Read::Attribute(name), accept, scan: Scan::All }
    }

    /// Text whose leading token must be numeric
    pub const fn numeric_text(locator: Locator) -> Self {
        Self { locator, read: Read::Text, accept: Accept::LeadingNumber, scan: Scan::First }
    }
}

static NAME_CHAIN: [Strategy; 4] = [
    Strategy::text(Locator::xpath(concat!(detail_root!(), "/div[2]/div[2]/div/div[1]/div[1]/h1"))),
    Strategy::text(Locator::xpath("//h1[contains(@class, 'DUwDvf')]")),
    Strategy::text(Locator::css("h1.DUwDvf")),
    Strategy::text(Locator::xpath("//h1[@data-attrid='title']")),
];

static RATING_CHAIN: [Strategy; 4] = [
    Strategy::attribute(
        Locator::xpath(concat!(detail_root!(), "/div[2]//span[@role='img' and contains(@aria-label, 'stars')]")),
        "aria-label",
        Accept::LeadingNumber,
    ),
    Strategy::numeric_text(Locator::css("span.ceNzKf[aria-hidden='true']")),
    Strategy::numeric_text(Locator::xpath("//span[@class='ceNzKf' and @aria-hidden='true']")),
    Strategy::numeric_text(Locator::css(".ceNzKf")),
];

static ADDRESS_CHAIN: [Strategy; 4] = [
    Strategy::scan_attribute(Locator::css("button[data-item-id=\"address\"]"), "aria-label", Accept::Contains("Address:")),
    Strategy::scan_attribute(Locator::xpath("//*[contains(@aria-label, 'Address:')]"), "aria-label", Accept::Contains("Address:")),
    Strategy::text(Locator::xpath("//button[@data-item-id='address']")),
    Strategy::text(Locator::xpath("//span[contains(text(), 'Address')]/following-sibling::span")),
];

static PHONE_CHAIN: [Strategy; 4] = [
    Strategy::scan_attribute(Locator::css("button[data-item-id*=\"phone\"]"), "aria-label", Accept::Contains("Phone:")),
    Strategy::scan_attribute(Locator::xpath("//*[contains(@aria-label, 'Phone:')]"), "aria-label", Accept::Contains("Phone:")),
    Strategy::text(Locator::xpath("//button[contains(@data-item-id, 'phone')]")),
    Strategy::text(Locator::xpath("//span[contains(text(), 'Phone')]/following-sibling::span")),
];

static WEBSITE_CHAIN: [Strategy; 3] = [
    Strategy::scan_attribute(
        Locator::xpath(concat!(detail_root!(), "/div[2]//a[contains(@aria-label, 'website')]")),
        "href",
        Accept::StartsWith("http"),
    ),
    Strategy::attribute(Locator::css("a[data-item-id=\"authority\"]"), "href", Accept::StartsWith("http")),
    Strategy::attribute(Locator::xpath("//a[@data-item-id='authority']"), "href", Accept::StartsWith("http")),
];

static REVIEWS_TAB_CHAIN: [Strategy; 2] = [
    Strategy::presence(Locator::xpath(concat!(detail_root!(), "/div[2]/div[3]/div/div/button[2]"))),
    Strategy::scan_attribute(Locator::css("button[role=\"tab\"]"), "aria-label", Accept::Contains("Reviews for")),
];

static STANDARD_CONTAINER_CHAIN: [Strategy; 1] = [Strategy::presence(Locator::xpath(concat!(detail_root!(), "/div[3]")))];

static SCHEDULING_CONTAINER_CHAIN: [Strategy; 2] = [
    Strategy::presence(Locator::xpath(concat!(detail_root!(), "/div[5]"))),
    Strategy::presence(Locator::xpath(concat!(detail_root!(), "/div[4]"))),
];

/// Logical fields resolvable through a fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Rating,
    Address,
    Phone,
    Website,
    ReviewsTab,
    ReviewContainer(LayoutVariant),
}

impl Field {
    pub fn chain(&self) -> &'static [Strategy] {
        match self {
            Self::Name => &NAME_CHAIN,
            Self::Rating => &RATING_CHAIN,
            Self::Address => &ADDRESS_CHAIN,
            Self::Phone => &PHONE_CHAIN,
            Self::Website => &WEBSITE_CHAIN,
            Self::ReviewsTab => &REVIEWS_TAB_CHAIN,
            Self::ReviewContainer(LayoutVariant::Standard) => &STANDARD_CONTAINER_CHAIN,
            Self::ReviewContainer(LayoutVariant::Scheduling) => &SCHEDULING_CONTAINER_CHAIN,
        }
    }
}

/// Element matched by a strategy, with the value it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub element: ElementRef,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Resolved),
    NotFound,
}

impl Resolution {
    pub fn element(self) -> Option<ElementRef> {
        match self {
            Self::Found(resolved) => Some(resolved.element),
            Self::NotFound => None,
        }
    }

    pub fn value(self) -> Option<String> {
        match self {
            Self::Found(resolved) => resolved.value,
            Self::NotFound => None,
        }
    }
}

/// Walks fallback chains against a driver; lookup failures count as misses
pub struct SelectorResolver {
    driver: Arc<dyn DomDriver>,
    timeout: Duration,
}

impl SelectorResolver {
    pub fn new(driver: Arc<dyn DomDriver>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    pub async fn resolve(&self, field: Field) -> Resolution {
        self.resolve_chain(field.chain()).await
    }

    pub async fn resolve_value(&self, field: Field) -> Option<String> {
        self.resolve(field).await.value()
    }

    /// Return the first strategy in `chain` that matches and passes its acceptance rule
    pub async fn resolve_chain(&self, chain: &[Strategy]) -> Resolution {
        for strategy in chain {
            match self.try_strategy(strategy).await {
                Ok(Some(resolved)) => {
                    debug!("Resolved {}", strategy.locator);
                    return Resolution::Found(resolved);
                }
                Ok(None) => {}
                Err(e) => debug!("Strategy {} failed: {}", strategy.locator, e),
            }
        }

        Resolution::NotFound
    }

    async fn try_strategy(&self, strategy: &Strategy) -> ScrapeResult<Option<Resolved>> {
        let first = match self.driver.find_one(&strategy.locator, self.timeout).await? {
            Some(element) => element,
            None => return Ok(None),
        };

        let candidates = match strategy.scan {
            Scan::First => vec![first],
            Scan::All => self.driver.find_all(&strategy.locator).await?,
        };

        for element in candidates {
            let value = match strategy.read {
                Read::Presence => return Ok(Some(Resolved { element, value: None })),
                Read::Text => self.driver.read_text(&element).await.map(Some),
                Read::Attribute(name) => self.driver.read_attribute(&element, name).await,
            };

            match value {
                Ok(Some(value)) => {
                    let value = value.trim();
                    if strategy.accept.accepts(value) {
                        return Ok(Some(Resolved { element, value: Some(value.to_string()) }));
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Could not read {}: {}", element.locator, e),
            }
        }

        Ok(None)
    }
}
