//! Error types and handling for the geotrail enrichment pipeline

use std::time::Duration;
use thiserror::Error;

/// Main error type for the geotrail crate
#[derive(Error, Debug)]
pub enum GeotrailError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Every geocoding attempt was spent without a definitive answer
    #[error("Geocoding gave up after {attempts} attempts: {last}")]
    GeocodingExhausted { attempts: u32, last: GeocodeFailure },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Payload (de)serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl GeotrailError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            GeotrailError::Config { .. } => {
                "Configuration error. Please check your config file and environment.".to_string()
            }
            GeotrailError::Validation { message } => format!("Invalid input: {message}"),
            GeotrailError::GeocodingExhausted { .. } => {
                "The geocoding service could not be reached. Locations were left unenriched."
                    .to_string()
            }
            GeotrailError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            GeotrailError::Json { .. } => {
                "The location payload is not valid Overland JSON.".to_string()
            }
        }
    }
}

/// Why a single reverse-geocoding attempt did not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeFailure {
    /// HTTP 429, optionally carrying the server's `Retry-After`
    #[error("rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 5xx
    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    /// Any other non-success status
    #[error("client error (HTTP {status})")]
    ClientError { status: u16 },

    /// Connection error, timeout or an unparseable body
    #[error("transport failure: {message}")]
    TransportFailure { message: String },

    /// A 2xx answer without a usable display name
    #[error("response carried no usable display name")]
    NoData,
}

impl GeocodeFailure {
    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after },
            s if s >= 500 => Self::ServerError { status: s },
            s => Self::ClientError { status: s },
        }
    }

    /// Whether another attempt may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::TransportFailure { .. }
        )
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }
}
