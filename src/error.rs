//! Error types for the identity fusion pipeline.
//!
//! Only conditions that abort a run are errors. Count mismatches between tags
//! and tracks, and missing RFID or pose data, are ordinary states of the data
//! and are reported through the match report and `Option` fields instead.

use thiserror::Error;

/// A specialized `Result` type for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by an external data source.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or calibration. Raised before any work is done.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The assignment solver could not produce a matching.
    #[error("assignment failed: {message}")]
    Assignment { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by an RFID or pose source, passed through unchanged.
    #[error("source error: {0}")]
    Source(SourceError),
}

impl From<std::convert::Infallible> for Error {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn assignment(message: impl Into<String>) -> Self {
        Self::Assignment {
            message: message.into(),
        }
    }

    /// Whether this error stems from configuration rather than data or I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message() {
        let err = Error::configuration("interval length must be positive");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "configuration error: interval length must be positive"
        );
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "rfid.csv"))?;
            Ok(())
        }
        let err = open().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_configuration());
    }
}
