use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::{
    BusinessRecord, LayoutVariant, NO_ADDRESS, NO_PHONE, NO_RATING, NO_WEBSITE, UNKNOWN_NAME,
};
use super::pagination::ItemHandle;
use super::selectors::{Field, SelectorResolver};
use crate::dom::DomDriver;
use crate::utils::capture_timestamp;
use crate::utils::string_utils::StringUtils;

/// Reads the business record from an opened detail panel
pub struct DetailExtractor {
    driver: Arc<dyn DomDriver>,
    resolver: SelectorResolver,
}

impl DetailExtractor {
    pub fn new(driver: Arc<dyn DomDriver>, field_timeout: Duration) -> Self {
        Self {
            resolver: SelectorResolver::new(driver.clone(), field_timeout),
            driver,
        }
    }

    /// Extract the record for `item`. Missing fields become placeholders.
    pub async fn extract(&self, item: &ItemHandle, variant: LayoutVariant) -> BusinessRecord {
        let name = self.resolver.resolve_value(Field::Name).await;
        if name.is_none() {
            warn!("Could not read a name for item {}, record marked as {}", item.index, UNKNOWN_NAME);
        }

        let rating = self
            .resolver
            .resolve_value(Field::Rating)
            .await
            .and_then(|label| StringUtils::parse_rating(&label));

        let address = self
            .resolver
            .resolve_value(Field::Address)
            .await
            .map(|value| StringUtils::strip_label(&value, "Address:"))
            .filter(|value| !value.is_empty());

        let phone = self
            .resolver
            .resolve_value(Field::Phone)
            .await
            .map(|value| StringUtils::strip_label(&value, "Phone:"))
            .filter(|value| !value.is_empty());

        let website = self.resolver.resolve_value(Field::Website).await;

        let url = match self.driver.current_location().await {
            Ok(url) => url,
            Err(e) => {
                debug!("Could not read location for item {}: {}", item.index, e);
                String::new()
            }
        };

        BusinessRecord {
            name: name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            rating: rating.unwrap_or_else(|| NO_RATING.to_string()),
            address: address.unwrap_or_else(|| NO_ADDRESS.to_string()),
            phone: phone.unwrap_or_else(|| NO_PHONE.to_string()),
            website: website.unwrap_or_else(|| NO_WEBSITE.to_string()),
            url,
            timestamp: capture_timestamp(),
            variant: Some(variant),
        }
    }
}
