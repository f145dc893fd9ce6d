use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::csv_exporter::{merge_files, write_rows};
use super::Tabular;
use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::file_timestamp;

/// Where a flushed batch is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushTarget {
    /// One `<stem>_part_<NNNN>.csv` per flush, merged at the end
    Parts { directory: PathBuf, stem: String },
    /// Rows appended to one cumulative file
    Append { path: PathBuf },
}

/// A batch that reached disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub path: PathBuf,
    pub records: usize,
}

/// Buffers records and persists them in independent batches
pub struct BatchCoordinator<T> {
    buffer: Vec<T>,
    threshold: usize,
    target: FlushTarget,
    next_part: usize,
    parts: Vec<PathBuf>,
    flushed_records: usize,
}

impl<T: Tabular> BatchCoordinator<T> {
    pub fn new(target: FlushTarget, threshold: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(threshold),
            threshold: threshold.max(1),
            target,
            next_part: 1,
            parts: Vec::new(),
            flushed_records: 0,
        }
    }

    pub fn add(&mut self, record: T) {
        self.buffer.push(record);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn target(&self) -> &FlushTarget {
        &self.target
    }

    /// Part files written so far, in index order
    pub fn parts(&self) -> &[PathBuf] {
        &self.parts
    }

    pub fn flushed_records(&self) -> usize {
        self.flushed_records
    }

    /// Flush when the buffer holds at least `threshold` records
    pub async fn flush_if_threshold(&mut self) -> ScrapeResult<Option<FlushReport>> {
        if self.buffer.len() < self.threshold {
            return Ok(None);
        }
        self.flush().await
    }

    /// Flush whatever is left in the buffer
    pub async fn flush_final(&mut self) -> ScrapeResult<Option<FlushReport>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.flush().await
    }

    /// The buffer is emptied before writing; records of a failed write are lost
    async fn flush(&mut self) -> ScrapeResult<Option<FlushReport>> {
        let batch = std::mem::take(&mut self.buffer);

        let (path, append) = match &self.target {
            FlushTarget::Parts { directory, stem } => {
                let path = directory.join(format!("{}_part_{:04}.csv", stem, self.next_part));
                self.next_part += 1;
                (path, false)
            }
            FlushTarget::Append { path } => (path.clone(), true),
        };

        let stats = write_rows(&path, &batch, append).await?;

        if !append {
            self.parts.push(path.clone());
        }
        self.flushed_records += stats.record_count;

        info!("Flushed {} records to {}", stats.record_count, path.display());
        Ok(Some(FlushReport { path, records: stats.record_count }))
    }

    /// Merge part files into `<stem>_<timestamp>.csv`, optionally deleting the parts.
    /// Parts are merged at most once. For an append target the cumulative file
    /// is already the final artifact.
    pub async fn merge_parts(&mut self, remove_parts: bool) -> ScrapeResult<PathBuf> {
        let (directory, stem) = match &self.target {
            FlushTarget::Parts { directory, stem } => (directory.clone(), stem.clone()),
            FlushTarget::Append { path } => return Ok(path.clone()),
        };

        let parts = std::mem::take(&mut self.parts);
        if parts.is_empty() {
            return Err(ScrapeError::persistence(format!("No {} part files to merge", stem)));
        }

        let output = directory.join(format!("{}_{}.csv", stem, file_timestamp()));
        let stats = merge_files(&parts, &output, T::headers()).await?;
        info!("Merged {} part files into {} ({} records)", parts.len(), output.display(), stats.record_count);

        if remove_parts {
            for part in &parts {
                remove_part(part).await;
            }
        }

        Ok(output)
    }
}

async fn remove_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("Removed part file {}", part.display()),
        Err(e) => warn!("Could not remove part file {}: {}", part.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::csv_exporter::read_records;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Numbered(usize);

    impl Tabular for Numbered {
        fn headers() -> &'static [&'static str] {
            &["N"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    fn parts_target(dir: &TempDir) -> FlushTarget {
        FlushTarget::Parts { directory: dir.path().to_path_buf(), stem: "business_info".to_string() }
    }

    #[tokio::test]
    async fn test_threshold_flushes_into_parts_and_merges_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut coordinator = BatchCoordinator::new(parts_target(&temp_dir), 20);

        for n in 0..47 {
            coordinator.add(Numbered(n));
            coordinator.flush_if_threshold().await.unwrap();
        }
        let last = coordinator.flush_final().await.unwrap().unwrap();
        assert_eq!(last.records, 7);
        assert!(coordinator.is_empty());

        let sizes: Vec<usize> = coordinator
            .parts()
            .iter()
            .map(|part| read_records(part).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![20, 20, 7]);
        assert!(coordinator.parts()[0].ends_with("business_info_part_0001.csv"));
        assert!(coordinator.parts()[2].ends_with("business_info_part_0003.csv"));

        let merged = coordinator.merge_parts(true).await.unwrap();
        let values: Vec<usize> = read_records(&merged)
            .unwrap()
            .iter()
            .map(|record| record[0].parse().unwrap())
            .collect();
        assert_eq!(values, (0..47).collect::<Vec<_>>());

        // Only the merged artifact is left behind
        let remaining = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(remaining, 1);
        assert_eq!(coordinator.flushed_records(), 47);
    }

    #[tokio::test]
    async fn test_flush_final_on_empty_buffer_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut coordinator: BatchCoordinator<Numbered> = BatchCoordinator::new(parts_target(&temp_dir), 20);

        assert_eq!(coordinator.flush_final().await.unwrap(), None);
        assert!(coordinator.parts().is_empty());

        let error = coordinator.merge_parts(true).await.unwrap_err();
        assert_eq!(error.category(), "persistence");
    }

    #[tokio::test]
    async fn test_append_target_accumulates_across_coordinators() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reviews.csv");

        for run in 0..2 {
            let mut coordinator = BatchCoordinator::new(FlushTarget::Append { path: path.clone() }, 2);
            coordinator.add(Numbered(run * 10));
            coordinator.add(Numbered(run * 10 + 1));
            coordinator.flush_if_threshold().await.unwrap();
            assert_eq!(coordinator.merge_parts(true).await.unwrap(), path);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "N\n0\n1\n10\n11\n");
    }

    #[tokio::test]
    async fn test_parts_are_merged_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut coordinator = BatchCoordinator::new(parts_target(&temp_dir), 2);
        for n in 0..3 {
            coordinator.add(Numbered(n));
            coordinator.flush_if_threshold().await.unwrap();
        }
        coordinator.flush_final().await.unwrap();

        coordinator.merge_parts(false).await.unwrap();
        assert!(coordinator.parts().is_empty());
        assert!(coordinator.merge_parts(false).await.is_err());

        // Two kept parts and a single merged artifact
        let files = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(files, 3);
    }

    #[tokio::test]
    async fn test_failed_flush_empties_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let target = FlushTarget::Append { path: temp_dir.path().join("missing").join("business_info.csv") };
        let mut coordinator = BatchCoordinator::new(target, 1);

        coordinator.add(Numbered(1));
        assert!(coordinator.flush_if_threshold().await.is_err());
        assert!(coordinator.is_empty());
        assert_eq!(coordinator.flushed_records(), 0);
    }
}
