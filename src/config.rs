//! Configuration management and validation.
//!
//! Provides the settings for talking to the World Bank API, the indicator
//! catalog and year range the panel is built over, and export options.
//! Values layer as defaults, then an optional JSON file, then CLI flags.

use crate::catalog::IndicatorCatalog;
use crate::error::{DashboardError, Result};
use crate::models::YearRange;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default World Bank Indicators API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Supported compression algorithms for parquet exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Global configuration for loading and exporting the panel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the World Bank API (no trailing slash needed)
    pub api_base_url: String,

    /// Indicator key to series code mapping; keys become panel columns
    pub indicators: IndicatorCatalog,

    /// Years the panel covers, inclusive
    pub years: YearRange,

    /// Records requested per API page
    pub per_page: usize,

    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,

    /// Indicator downloads allowed in flight at once
    pub max_concurrent_requests: usize,

    /// Compression used when exporting tables to parquet
    pub export_compression: CompressionAlgorithm,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            indicators: IndicatorCatalog::default(),
            years: YearRange::default(),
            per_page: 20_000,
            request_timeout_secs: 60,
            max_concurrent_requests: 4,
            export_compression: CompressionAlgorithm::Snappy,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON configuration file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            DashboardError::configuration(format!(
                "Invalid configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable before any network traffic
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(DashboardError::configuration("API base URL cannot be empty"));
        }
        if self.years.start > self.years.end {
            return Err(DashboardError::configuration(format!(
                "Year range {} is empty",
                self.years
            )));
        }
        if self.per_page == 0 {
            return Err(DashboardError::configuration("per_page must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(DashboardError::configuration(
                "request_timeout_secs must be positive",
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(DashboardError::configuration(
                "max_concurrent_requests must be positive",
            ));
        }
        self.indicators.validate()
    }

    /// Create configuration with a custom API endpoint
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Create configuration with a custom indicator catalog
    pub fn with_indicators(mut self, indicators: IndicatorCatalog) -> Self {
        self.indicators = indicators;
        self
    }

    /// Create configuration with a custom year range
    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set maximum concurrent indicator downloads
    pub fn with_max_concurrent_requests(mut self, max_requests: usize) -> Self {
        self.max_concurrent_requests = max_requests;
        self
    }

    pub fn with_export_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.export_compression = compression;
        self
    }
}
