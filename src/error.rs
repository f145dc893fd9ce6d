use thiserror::Error;

/// Error taxonomy for the listing traversal engine
#[derive(Error, Debug)]
pub enum ScrapeError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Session errors
    #[error("Browser initialization failed: {message}")]
    BrowserInit { message: String },

    #[error("Navigation failed: {url} - {message}")]
    Navigation { url: String, message: String },

    #[error("No search results found for: {term}")]
    NoResults { term: String },

    // Automation errors
    #[error("Automation error: {message}")]
    Automation { message: String },

    #[error("Script execution failed: {message}")]
    Script { message: String },

    #[error("Element no longer present: {locator}")]
    StaleElement { locator: String },

    #[error("Click failed: {locator}")]
    ClickFailed { locator: String },

    // Persistence errors
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("File write failed: {path}")]
    FileWrite { path: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ScrapeError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an automation error
    pub fn automation(message: impl Into<String>) -> Self {
        Self::Automation { message: message.into() }
    }

    /// Create a script error
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script { message: message.into() }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into() }
    }

    /// Check if error is recoverable at the item boundary
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Automation { .. } |
            Self::Script { .. } |
            Self::StaleElement { .. } |
            Self::ClickFailed { .. } |
            Self::Persistence { .. } |
            Self::FileWrite { .. } |
            Self::Csv(_) |
            Self::Io(_) => true,

            Self::Configuration { .. } |
            Self::BrowserInit { .. } |
            Self::Navigation { .. } |
            Self::NoResults { .. } => false,

            Self::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::BrowserInit { .. } | Self::Navigation { .. } | Self::NoResults { .. } => "initialization",
            Self::Automation { .. } | Self::Script { .. } | Self::StaleElement { .. } | Self::ClickFailed { .. } => "automation",
            Self::Persistence { .. } | Self::FileWrite { .. } | Self::Csv(_) | Self::Io(_) => "persistence",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for the traversal engine
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Convert anyhow::Error to ScrapeError
impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}
