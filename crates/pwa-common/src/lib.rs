//! # PWA Common
//!
//! Error types and logging configuration shared by the offline build
//! tooling.
//!
//! ## Features
//!
//! - Unified build error type with source chaining
//! - Logging configuration and setup
//! - Result extension traits

use std::path::PathBuf;
use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for build-time operations.
///
/// Every variant aborts the build: nothing is written once one of these
/// has been produced.
#[derive(Error, Debug)]
pub enum PwaError {
    /// Plugin options could not be loaded or are inconsistent.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The application descriptor is not a valid manifest.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A file that has to be precached is absent from the build output.
    #[error("Missing precache asset: {}", .0.display())]
    MissingAsset(PathBuf),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PwaError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a manifest error.
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest(message.into())
    }

    /// Create a missing asset error.
    pub fn missing_asset(path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset(path.into())
    }

    /// Get the error category for reporting.
    pub fn category(&self) -> &'static str {
        match self {
            PwaError::Config { .. } => "config",
            PwaError::Manifest(_) => "manifest",
            PwaError::MissingAsset(_) => "missing_asset",
            PwaError::Io(_) => "io",
            PwaError::Json(_) => "json",
            PwaError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, PwaError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Wrap any error as a config error carrying `message`.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| PwaError::config_with_source(message, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_categories() {
        assert_eq!(PwaError::config("bad").category(), "config");
        assert_eq!(PwaError::manifest("bad").category(), "manifest");
        assert_eq!(
            PwaError::missing_asset("dist/offline.html").category(),
            "missing_asset"
        );
    }

    #[test]
    fn test_missing_asset_message() {
        let err = PwaError::missing_asset("dist/offline.html");
        assert_eq!(err.to_string(), "Missing precache asset: dist/offline.html");
    }

    #[test]
    fn test_context_keeps_source() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "pwa.config.json",
        ));
        let err = io.context("reading plugin options").unwrap_err();
        assert_eq!(err.category(), "config");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("reading plugin options"));
    }
}
