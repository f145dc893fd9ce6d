use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::export::Tabular;

pub const UNKNOWN_NAME: &str = "Unknown";
pub const NO_RATING: &str = "No rating";
pub const NO_ADDRESS: &str = "No address";
pub const NO_PHONE: &str = "No phone";
pub const NO_WEBSITE: &str = "No website";

/// Capture timestamp format used in every artifact
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Markup family of a detail page or review panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    Standard,
    Scheduling,
}

impl LayoutVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Scheduling => "scheduling",
        }
    }

    pub fn alternate(&self) -> Self {
        match self {
            Self::Standard => Self::Scheduling,
            Self::Scheduling => Self::Standard,
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One business listing as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub name: String,
    pub rating: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub url: String,
    pub timestamp: String,
    #[serde(skip)]
    pub variant: Option<LayoutVariant>,
}

impl BusinessRecord {
    /// Flat view of the record, placeholders mapped to `None`
    pub fn fields(&self) -> BTreeMap<&'static str, Option<String>> {
        fn present(value: &str, placeholder: &str) -> Option<String> {
            (value != placeholder && !value.is_empty()).then(|| value.to_string())
        }

        let mut fields = BTreeMap::new();
        fields.insert("name", present(&self.name, UNKNOWN_NAME));
        fields.insert("rating", present(&self.rating, NO_RATING));
        fields.insert("address", present(&self.address, NO_ADDRESS));
        fields.insert("phone", present(&self.phone, NO_PHONE));
        fields.insert("website", present(&self.website, NO_WEBSITE));
        fields.insert("url", present(&self.url, ""));
        fields.insert("timestamp", present(&self.timestamp, ""));
        fields
    }
}

impl Tabular for BusinessRecord {
    fn headers() -> &'static [&'static str] {
        &["Name", "Rating", "Address", "Phone", "Website", "URL", "Timestamp"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.rating.clone(),
            self.address.clone(),
            self.phone.clone(),
            self.website.clone(),
            self.url.clone(),
            self.timestamp.clone(),
        ]
    }
}

/// One review as read from the review panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer_name: String,
    pub review_text: String,
    pub review_date: String,
    pub photo_urls: Vec<String>,
}

/// A review joined with the business it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub business_name: String,
    pub review: ReviewRecord,
    pub timestamp: String,
}

impl ReviewRow {
    pub fn new(business_name: impl Into<String>, review: ReviewRecord, timestamp: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            review,
            timestamp: timestamp.into(),
        }
    }
}

impl Tabular for ReviewRow {
    fn headers() -> &'static [&'static str] {
        &["Business Name", "Reviewer Name", "Review Text", "Review Date", "Photo URLs", "Timestamp"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.business_name.clone(),
            self.review.reviewer_name.clone(),
            self.review.review_text.clone(),
            self.review.review_date.clone(),
            self.review.photo_urls.join(", "),
            self.timestamp.clone(),
        ]
    }
}
