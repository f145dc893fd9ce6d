use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ExportStats, Tabular};
use crate::error::{ScrapeError, ScrapeResult};

/// Write `rows` to `path`. In append mode rows go after any existing content
/// and the header is only written when the file is new or empty.
pub async fn write_rows<T: Tabular>(path: &Path, rows: &[T], append: bool) -> ScrapeResult<ExportStats> {
    debug!("Writing {} rows to CSV: {}", rows.len(), path.display());

    let existing_len = if append {
        tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    } else {
        0
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| ScrapeError::FileWrite { path: format!("{}: {}", path.display(), e) })?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if existing_len == 0 {
        writer.write_record(T::headers())?;
    }

    for row in rows {
        writer.write_record(row.row())?;
    }

    writer.flush()?;
    drop(writer);

    let file_size = tokio::fs::metadata(path).await?.len();

    Ok(ExportStats {
        file_path: path.to_path_buf(),
        record_count: rows.len(),
        file_size_bytes: file_size,
    })
}

/// Read the data rows of a CSV file written by [`write_rows`]
pub fn read_records(path: &Path) -> ScrapeResult<Vec<StringRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Concatenate the data rows of `inputs` in order into `output`
pub async fn merge_files(inputs: &[PathBuf], output: &Path, headers: &[&str]) -> ScrapeResult<ExportStats> {
    let file = std::fs::File::create(output)
        .map_err(|e| ScrapeError::FileWrite { path: format!("{}: {}", output.display(), e) })?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(headers)?;

    let mut record_count = 0;
    for input in inputs {
        let records = read_records(input)?;
        debug!("Merging {} rows from {}", records.len(), input.display());
        for record in &records {
            writer.write_record(record)?;
        }
        record_count += records.len();
    }

    writer.flush()?;
    drop(writer);

    let file_size = tokio::fs::metadata(output).await?.len();
    info!("CSV merge completed: {} records, {} bytes", record_count, file_size);

    Ok(ExportStats {
        file_path: output.to_path_buf(),
        record_count,
        file_size_bytes: file_size,
    })
}
