use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::LayoutVariant;
use super::selectors::{
    item_badge_locator, PRIMARY_SCHEDULING_PROBES, QUICK_SCHEDULING_PROBES, REVIEW_ANCHOR,
    SECONDARY_SCHEDULING_PROBES,
};
use crate::dom::{DomDriver, ElementRef, Locator};

const HIGH_CONFIDENCE: u32 = 4;
const LOW_CONFIDENCE: u32 = 2;
const PRIMARY_WEIGHT: u32 = 3;
const SECONDARY_WEIGHT: u32 = 2;

/// Per-traversal memo of layout decisions
#[derive(Debug, Clone, Default)]
pub struct TraversalContext {
    review_variant: Option<LayoutVariant>,
    scroll_container: Option<(LayoutVariant, ElementRef)>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn review_variant(&self) -> Option<LayoutVariant> {
        self.review_variant
    }

    /// Scroll container resolved earlier for `variant`
    pub fn cached_container(&self, variant: LayoutVariant) -> Option<&ElementRef> {
        match &self.scroll_container {
            Some((cached, element)) if *cached == variant => Some(element),
            _ => None,
        }
    }

    pub fn remember_container(&mut self, variant: LayoutVariant, element: ElementRef) {
        self.scroll_container = Some((variant, element));
    }

    pub fn forget_container(&mut self) {
        self.scroll_container = None;
    }
}

/// Evidence gathered while classifying a review panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewEvidence {
    pub quick_match: bool,
    pub score: u32,
    pub anchor_present: bool,
}

impl ReviewEvidence {
    pub fn decide(&self) -> LayoutVariant {
        if self.quick_match || self.score >= HIGH_CONFIDENCE {
            return LayoutVariant::Scheduling;
        }

        if !self.anchor_present && self.score >= LOW_CONFIDENCE {
            return LayoutVariant::Scheduling;
        }

        LayoutVariant::Standard
    }
}

/// Tags results and review panels with their layout variant
pub struct LayoutClassifier {
    driver: Arc<dyn DomDriver>,
    badge_timeout: Duration,
}

impl LayoutClassifier {
    pub fn new(driver: Arc<dyn DomDriver>, badge_timeout: Duration) -> Self {
        Self { driver, badge_timeout }
    }

    /// Variant of the result at `index`, read from its booking badge
    pub async fn classify_item(&self, index: usize) -> LayoutVariant {
        let badge = match self.driver.find_one(&item_badge_locator(index), self.badge_timeout).await {
            Ok(Some(badge)) => badge,
            _ => return LayoutVariant::Standard,
        };

        match self.driver.read_text(&badge).await {
            Ok(text) if text.to_lowercase().contains("book online") => {
                debug!("Item {} carries a booking badge", index);
                LayoutVariant::Scheduling
            }
            Ok(_) => LayoutVariant::Standard,
            Err(e) => {
                debug!("Could not read badge of item {}: {}", index, e);
                LayoutVariant::Standard
            }
        }
    }

    /// Variant of the review panel; the first decision is kept for the whole traversal
    pub async fn classify_reviews(&self, ctx: &mut TraversalContext) -> LayoutVariant {
        if let Some(variant) = ctx.review_variant {
            debug!("Using cached review layout: {}", variant);
            return variant;
        }

        let evidence = self.gather_evidence().await;
        let variant = evidence.decide();

        if variant == LayoutVariant::Standard && !evidence.anchor_present && !evidence.quick_match {
            warn!(
                "Review layout unclear (score {}, no structural anchor), defaulting to standard",
                evidence.score
            );
        } else {
            info!(
                "Review layout classified as {} (quick match: {}, score: {})",
                variant, evidence.quick_match, evidence.score
            );
        }

        ctx.review_variant = Some(variant);
        variant
    }

    pub async fn gather_evidence(&self) -> ReviewEvidence {
        if self.any_present(&QUICK_SCHEDULING_PROBES).await {
            return ReviewEvidence { quick_match: true, score: 0, anchor_present: false };
        }

        let mut score = 0;
        if self.any_present(&PRIMARY_SCHEDULING_PROBES).await {
            score += PRIMARY_WEIGHT;
        }
        if self.any_present(&SECONDARY_SCHEDULING_PROBES).await {
            score += SECONDARY_WEIGHT;
        }

        let anchor_present = self.driver.is_present(&REVIEW_ANCHOR, Duration::ZERO).await;

        ReviewEvidence { quick_match: false, score, anchor_present }
    }

    async fn any_present(&self, probes: &[Locator]) -> bool {
        for probe in probes {
            // Lookup errors count as a miss
            if let Ok(found) = self.driver.find_all(probe).await {
                if !found.is_empty() {
                    return true;
                }
            }
        }
        false
    }
}
