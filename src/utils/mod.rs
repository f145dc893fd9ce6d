/// Utility functions and helpers
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};
use crate::scraper::models::TIMESTAMP_FORMAT;

pub mod string_utils;

/// Build the search URL for `term`, e.g. `.../maps/search/<term>/?hl=en`
pub fn build_search_url(base_url: &str, term: &str, language: &str) -> ScrapeResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ScrapeError::config(format!("Invalid search base URL '{}': {}", base_url, e)))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ScrapeError::config(format!("Search base URL cannot carry a path: {}", base_url)))?;
        segments.pop_if_empty().push(term.trim()).push("");
    }

    if !language.is_empty() {
        url.query_pairs_mut().clear().append_pair("hl", language);
    }

    Ok(url)
}

/// Local capture time in the artifact timestamp format
pub fn capture_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Local time suitable for file names
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Format duration in human readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{}m {}s", minutes, seconds)
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        format!("{}h {}m {}s", hours, minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("https://www.google.com/maps/search/", "bakery", "en").unwrap();
        assert_eq!(url.as_str(), "https://www.google.com/maps/search/bakery/?hl=en");
    }

    #[test]
    fn test_build_search_url_encodes_term() {
        let url = build_search_url("https://www.google.com/maps/search", " coffee & tea/bar ", "en").unwrap();
        assert_eq!(url.as_str(), "https://www.google.com/maps/search/coffee%20&%20tea%2Fbar/?hl=en");
    }

    #[test]
    fn test_build_search_url_rejects_bad_base() {
        assert!(build_search_url("not a url", "bakery", "en").is_err());
        assert!(build_search_url("mailto:someone@example.com", "bakery", "en").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(std::time::Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(std::time::Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_timestamps_have_expected_shape() {
        assert_eq!(capture_timestamp().len(), "2024-01-01 00:00:00".len());
        assert_eq!(file_timestamp().len(), "20240101_000000".len());
    }
}
