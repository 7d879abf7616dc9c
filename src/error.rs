//! Error handling for panel loading, snapshots and model fitting.
//!
//! Provides error types with context for data-source failures, schema
//! violations in the reshaped panel, and fits on unusable input.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Data source unavailable: {message}")]
    DataSourceUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// `found` counts usable points with distinct x values
    #[error(
        "Insufficient data for fit: need at least {required} usable points with distinct x values, found {found}"
    )]
    InsufficientData { required: usize, found: usize },

    #[error("Column '{column}' is not part of the panel (not in the indicator catalog)")]
    MissingColumn { column: String },

    #[error("Malformed data source response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Duplicate observation for {country} in {year}: indicator '{indicator}' reported twice")]
    DuplicateObservation {
        country: String,
        year: i32,
        indicator: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    /// Create a data source error without an underlying cause
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::DataSourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a data source error wrapping the transport failure
    pub fn unavailable_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataSourceUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the error only means a view's indicators are not configured
    pub fn is_missing_column(&self) -> bool {
        matches!(self, Self::MissingColumn { .. })
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
