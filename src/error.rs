// src/error.rs

//! Unified error handling for the collection pipeline.

use std::fmt;

use thiserror::Error;

/// Process exit status reserved for rate-limiting, consumed by driver scripts.
pub const EXIT_RATE_LIMITED: u8 = 2;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV read/write failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Scraping error with context
    #[error("Scrape error for {context}: {message}")]
    Scrape { context: String, message: String },

    /// The remote site kept answering 429 after all retries.
    ///
    /// Surfaces as process exit status 2, which the state loop treats as a
    /// retry-after-cooldown signal.
    #[error("Rate limited fetching {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a scrape error with context.
    pub fn scrape(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scrape {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a rate-limit error for a URL.
    pub fn rate_limited(url: impl Into<String>, attempts: u32) -> Self {
        Self::RateLimited {
            url: url.into(),
            attempts,
        }
    }

    /// Whether this error is the rate-limiting signal (exit status 2).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_detection() {
        let err = AppError::rate_limited("https://example.com/usa/", 3);
        assert!(err.is_rate_limited());

        let err = AppError::validation("empty state list");
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_scrape_error_display() {
        let err = AppError::scrape("texas/dallas", "no cards found");
        assert_eq!(
            err.to_string(),
            "Scrape error for texas/dallas: no cards found"
        );
    }
}
