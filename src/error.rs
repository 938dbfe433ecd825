//! Error types for loading, geocoding, configuration and export.
//!
//! Only load and config failures are meant to reach the user as fatal
//! errors. `LookupError` is always recovered by the location resolver.

use std::path::PathBuf;

/// Result type for loading a complaint file.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for a single geocoding lookup.
pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("file has no header row")]
    MissingHeader,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no match for '{0}'")]
    NotFound(String),
    #[error("malformed geocoder response: {0}")]
    Malformed(String),
    #[error("geocoding disabled")]
    Disabled,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
