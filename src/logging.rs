use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// Initialize logging system
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = Vec::new();

    // Console layer
    if config.console_enabled {
        let console_layer = fmt::layer()
            .with_target(config.include_targets)
            .with_writer(std::io::stdout)
            .boxed();

        layers.push(console_layer);
    }

    // File layer
    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("mapscrape")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_directory)?;

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(config.include_targets)
            .with_writer(file_appender)
            .boxed();

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_enabled {
        info!("Log directory: {}", config.log_directory.display());
    }

    Ok(())
}

/// Structured logging context carried through a traversal
#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub run_id: Option<String>,
    pub search_term: Option<String>,
    pub item_index: Option<usize>,
    pub variant: Option<String>,
    pub status: Option<String>,
    pub error_category: Option<String>,
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl LogContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            run_id: None,
            search_term: None,
            item_index: None,
            variant: None,
            status: None,
            error_category: None,
            additional_fields: HashMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_item_index(mut self, index: usize) -> Self {
        self.item_index = Some(index);
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error_category(mut self, category: impl Into<String>) -> Self {
        self.error_category = Some(category.into());
        self
    }

    pub fn with_number_field(mut self, key: impl Into<String>, value: impl Into<i64>) -> Self {
        self.additional_fields.insert(key.into(), serde_json::Value::Number(serde_json::Number::from(value.into())));
        self
    }

    /// Derive a context for a new operation, keeping run-level fields
    pub fn for_operation(&self, operation: impl Into<String>) -> Self {
        Self {
            component: self.component.clone(),
            operation: operation.into(),
            run_id: self.run_id.clone(),
            search_term: self.search_term.clone(),
            item_index: None,
            variant: None,
            status: None,
            error_category: None,
            additional_fields: HashMap::new(),
        }
    }
}

/// Structured logging macros
#[macro_export]
macro_rules! log_info {
    ($context:expr, $($arg:tt)+) => {
        tracing::info!(
            component = %$context.component,
            operation = %$context.operation,
            run_id = ?$context.run_id,
            search_term = ?$context.search_term,
            item_index = ?$context.item_index,
            variant = ?$context.variant,
            status = ?$context.status,
            additional_fields = ?$context.additional_fields,
            $($arg)+
        );
    };
}

#[macro_export]
macro_rules! log_warn {
    ($context:expr, $($arg:tt)+) => {
        tracing::warn!(
            component = %$context.component,
            operation = %$context.operation,
            run_id = ?$context.run_id,
            search_term = ?$context.search_term,
            item_index = ?$context.item_index,
            variant = ?$context.variant,
            status = ?$context.status,
            error_category = ?$context.error_category,
            additional_fields = ?$context.additional_fields,
            $($arg)+
        );
    };
}

#[macro_export]
macro_rules! log_error {
    ($context:expr, $($arg:tt)+) => {
        tracing::error!(
            component = %$context.component,
            operation = %$context.operation,
            run_id = ?$context.run_id,
            search_term = ?$context.search_term,
            item_index = ?$context.item_index,
            variant = ?$context.variant,
            status = ?$context.status,
            error_category = ?$context.error_category,
            additional_fields = ?$context.additional_fields,
            $($arg)+
        );
    };
}

/// Run ID generation
pub struct RunIdGenerator;

impl RunIdGenerator {
    pub fn generate() -> String {
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let short = uuid::Uuid::new_v4().simple().to_string();
        format!("run-{}-{}", timestamp, &short[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("engine", "traverse")
            .with_run_id("run-1")
            .with_search_term("bakery")
            .with_item_index(4)
            .with_number_field("records", 12);

        assert_eq!(context.component, "engine");
        assert_eq!(context.operation, "traverse");
        assert_eq!(context.run_id, Some("run-1".to_string()));
        assert_eq!(context.item_index, Some(4));
        assert!(context.additional_fields.contains_key("records"));
    }

    #[test]
    fn test_for_operation_keeps_run_fields() {
        let context = LogContext::new("engine", "traverse")
            .with_run_id("run-1")
            .with_search_term("bakery")
            .with_item_index(2);

        let derived = context.for_operation("flush");
        assert_eq!(derived.operation, "flush");
        assert_eq!(derived.run_id, Some("run-1".to_string()));
        assert_eq!(derived.search_term, Some("bakery".to_string()));
        assert_eq!(derived.item_index, None);
    }

    #[test]
    fn test_run_id_generation() {
        let id1 = RunIdGenerator::generate();
        let id2 = RunIdGenerator::generate();

        assert_ne!(id1, id2);
        assert!(id1.starts_with("run-"));
    }
}
