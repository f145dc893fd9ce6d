use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::core::TraversalMode;

#[derive(Parser, Debug)]
#[command(name = "mapscrape")]
#[command(about = "Traverse map search results and extract business listings and reviews")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[arg(help = "Search term, e.g. \"bakery\"", value_parser = parse_search_term)]
    pub search_term: String,

    #[arg(long, help = "Only enumerate listings, skipping reviews")]
    pub no_reviews: bool,

    #[arg(short, long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Directory for CSV artifacts")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Show the browser window")]
    pub headed: bool,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn mode(&self) -> TraversalMode {
        if self.no_reviews {
            TraversalMode::Enumerate
        } else {
            TraversalMode::Full
        }
    }

    /// Apply command line flags on top of file and environment configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(output_dir) = &self.output_dir {
            config.export.output_directory = output_dir.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if self.no_reviews {
            config.reviews.enabled = false;
        }
    }
}

/// Trimmed search term of at least two characters
pub fn parse_search_term(raw: &str) -> Result<String, String> {
    let term = raw.trim();
    if term.is_empty() {
        return Err("search term must not be empty".to_string());
    }
    if term.chars().count() < 2 {
        return Err("search term must be at least 2 characters".to_string());
    }
    Ok(term.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_term_validation() {
        assert_eq!(parse_search_term("  bakery "), Ok("bakery".to_string()));
        assert!(parse_search_term("   ").is_err());
        assert!(parse_search_term(" a ").is_err());
        assert_eq!(parse_search_term("ab"), Ok("ab".to_string()));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "mapscrape", "coffee shop", "--no-reviews", "--output-dir", "/tmp/out", "--headed", "--verbose",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.search_term, "coffee shop");
        assert_eq!(cli.mode(), TraversalMode::Enumerate);
        assert_eq!(config.export.output_directory, PathBuf::from("/tmp/out"));
        assert!(!config.browser.headless);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_short_term_is_usage_error() {
        let error = Cli::try_parse_from(["mapscrape", "x"]).unwrap_err();
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_default_mode_is_full() {
        let cli = Cli::try_parse_from(["mapscrape", "bakery"]).unwrap();
        assert_eq!(cli.mode(), TraversalMode::Full);
        assert!(cli.config.is_none());
    }
}
