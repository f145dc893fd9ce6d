//! mapscrape - listing traversal and extraction for map search results
//!
//! This library provides:
//! - Result list pagination over a virtualized, lazily loaded panel
//! - Layout classification of listings and review panels
//! - Fallback selector resolution and detail extraction
//! - Nested review pagination
//! - Batched CSV persistence

pub mod cli;
pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod export;
pub mod logging;
pub mod scraper;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::core::{MapScrape, RunOutcome, TraversalMode, TraversalSummary};
pub use crate::dom::DomDriver;
pub use crate::error::{ScrapeError, ScrapeResult};
