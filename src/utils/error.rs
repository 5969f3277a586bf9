use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain not supported: {host}")]
    UnsupportedSite { host: String },

    #[error("Product already tracked: {sid}")]
    DuplicateProduct { sid: String },

    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Price element not found or unparseable for selector: {selector}")]
    ScrapeMiss { selector: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A scrape miss is the only failure class worth retrying in place;
    /// everything else is terminal for the current scan cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ScrapeMiss { .. })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::MalformedUrl(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
