use serde::Serialize;
use std::path::PathBuf;

pub mod batch;
pub mod csv_exporter;

pub use batch::{BatchCoordinator, FlushReport, FlushTarget};

/// A record that can be written as one CSV row
pub trait Tabular {
    fn headers() -> &'static [&'static str];

    fn row(&self) -> Vec<String>;
}

/// Export statistics
#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    pub file_path: PathBuf,
    pub record_count: usize,
    pub file_size_bytes: u64,
}
