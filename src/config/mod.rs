use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub search: SearchConfig,
    pub traversal: TraversalConfig,
    pub reviews: ReviewConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub user_agent: String,
    pub default_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub language: String,
    pub results_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub max_scroll_attempts: u32,
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub item_probe_timeout_ms: u64,
    pub field_timeout_ms: u64,
    pub badge_timeout_ms: u64,
    pub fast_preload_ceiling: u32,
    pub click_retries: u32,
    pub click_backoff_ms: u64,
    pub scroll_amount_px: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub enabled: bool,
    pub max_scroll_attempts: u32,
    pub scroll_amount_px: i64,
    pub tab_timeout_ms: u64,
    pub see_more_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_directory: PathBuf,
    pub batch_size: usize,
    pub remove_parts: bool,
    pub business_stem: String,
    pub reviews_stem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: PathBuf,
    pub max_files: usize,
    pub include_targets: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            default_timeout_ms: 10_000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.google.com/maps/search/".to_string(),
            language: "en".to_string(),
            results_timeout_ms: 15_000,
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 3,
            settle_delay_ms: 500,
            poll_interval_ms: 100,
            item_probe_timeout_ms: 3_000,
            field_timeout_ms: 3_000,
            badge_timeout_ms: 1_000,
            fast_preload_ceiling: 10_000,
            click_retries: 3,
            click_backoff_ms: 1_000,
            scroll_amount_px: 5_000,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_scroll_attempts: 3,
            scroll_amount_px: 6_000,
            tab_timeout_ms: 3_000,
            see_more_delay_ms: 1_000,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("data"),
            batch_size: 20,
            remove_parts: true,
            business_stem: "business_info".to_string(),
            reviews_stem: "reviews".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            console_enabled: true,
            log_directory: get_data_directory().join("logs"),
            max_files: 5,
            include_targets: false,
        }
    }
}

impl TraversalConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn item_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.item_probe_timeout_ms)
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms)
    }

    pub fn badge_timeout(&self) -> Duration {
        Duration::from_millis(self.badge_timeout_ms)
    }

    /// Delay before click retry `attempt` (0-based), doubling each time
    pub fn click_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.click_backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save().await {
                // A read-only config dir must not block a run
                tracing::warn!("Could not write default configuration: {}", e);
            }
            Ok(config)
        }
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to default location
    pub async fn save(&self) -> Result<()> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.search.base_url).is_err() {
            return Err(anyhow::anyhow!("Search base_url must be an absolute URL"));
        }

        if self.traversal.max_scroll_attempts == 0 {
            return Err(anyhow::anyhow!("Traversal max_scroll_attempts must be > 0"));
        }

        if self.traversal.click_retries == 0 {
            return Err(anyhow::anyhow!("Traversal click_retries must be > 0"));
        }

        if self.traversal.fast_preload_ceiling == 0 {
            return Err(anyhow::anyhow!("Traversal fast_preload_ceiling must be > 0"));
        }

        if self.reviews.max_scroll_attempts == 0 {
            return Err(anyhow::anyhow!("Reviews max_scroll_attempts must be > 0"));
        }

        if self.export.batch_size == 0 {
            return Err(anyhow::anyhow!("Export batch_size must be > 0"));
        }

        if self.export.business_stem.trim().is_empty() || self.export.reviews_stem.trim().is_empty() {
            return Err(anyhow::anyhow!("Export file stems must not be empty"));
        }

        info!("Configuration validation passed");
        Ok(())
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        let dirs_to_create = vec![
            self.export.output_directory.clone(),
        ];

        for dir in dirs_to_create {
            if !dir.exists() {
                tokio::fs::create_dir_all(&dir).await?;
                info!("Created directory: {}", dir.display());
            }
        }

        Ok(())
    }
}

/// Get the default data directory
pub fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "mapscrape", "mapscrape")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "mapscrape", "mapscrape")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_from<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(headless) = lookup("MAPSCRAPE_HEADLESS") {
            config.browser.headless = headless.to_lowercase() != "false";
        }

        if let Some(output_dir) = lookup("MAPSCRAPE_OUTPUT_DIR") {
            config.export.output_directory = PathBuf::from(output_dir);
        }

        if let Some(batch_str) = lookup("MAPSCRAPE_BATCH_SIZE") {
            if let Ok(batch) = batch_str.parse::<usize>() {
                config.export.batch_size = batch;
            }
        }

        if let Some(attempts_str) = lookup("MAPSCRAPE_MAX_SCROLL_ATTEMPTS") {
            if let Ok(attempts) = attempts_str.parse::<u32>() {
                config.traversal.max_scroll_attempts = attempts;
                config.reviews.max_scroll_attempts = attempts;
            }
        }

        if let Some(log_level) = lookup("MAPSCRAPE_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        info!("Applied environment variable overrides");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.export.batch_size, 20);
        assert_eq!(config.traversal.max_scroll_attempts, 3);
        assert_eq!(config.reviews.scroll_amount_px, 6_000);
    }

    #[test]
    fn test_click_backoff_doubles() {
        let traversal = TraversalConfig::default();
        assert_eq!(traversal.click_backoff(0), Duration::from_secs(1));
        assert_eq!(traversal.click_backoff(1), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        config.export.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("[export]\nbatch_size = 5\n").unwrap();
        assert_eq!(config.export.batch_size, 5);
        assert_eq!(config.export.business_stem, "business_info");
        assert!(config.reviews.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MAPSCRAPE_HEADLESS", "false"),
            ("MAPSCRAPE_BATCH_SIZE", "7"),
            ("MAPSCRAPE_MAX_SCROLL_ATTEMPTS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert!(!config.browser.headless);
        assert_eq!(config.export.batch_size, 7);
        assert_eq!(config.traversal.max_scroll_attempts, 3);
    }
}
