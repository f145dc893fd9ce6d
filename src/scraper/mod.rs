//! Listing traversal building blocks: result list pagination, layout
//! classification, field resolution, detail and review extraction.

pub mod browser;
pub mod classifier;
pub mod details;
pub mod models;
pub mod pagination;
pub mod reviews;
pub mod selectors;
pub mod stagnation;

pub use classifier::{LayoutClassifier, TraversalContext};
pub use details::DetailExtractor;
pub use models::{BusinessRecord, LayoutVariant, ReviewRecord, ReviewRow};
pub use pagination::{EndReason, ItemHandle, ListController, ListCursor, ListStep};
pub use reviews::ReviewPaginator;
pub use selectors::{Field, Resolution, SelectorResolver};
pub use stagnation::{ScrollState, StagnationTracker};
