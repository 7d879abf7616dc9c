//! World Dashboard Library
//!
//! Turns World Bank development, energy and emissions indicators into a tidy
//! per-country-per-year panel and derives the data behind a set of dashboard
//! pages from it.
//!
//! This library provides tools for:
//! - Downloading indicator series and country metadata from the World Bank API
//! - Reshaping the wide API shape into a normalized (country, year) panel
//! - Memoizing loaded panels per indicator catalog and year range
//! - Taking single-year snapshots with complete-case filtering and region names
//! - Fitting power-law (Cobb–Douglas) and linear models to snapshot columns
//! - Building the dashboard pages and exporting their tables to CSV or Parquet

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod fit;
pub mod loader;
pub mod models;
pub mod snapshot;
pub mod source;
pub mod views;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
    pub mod report;
}

// Re-export commonly used types
pub use cache::DatasetCache;
pub use catalog::{IndicatorCatalog, RegionNames};
pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use fit::{FitKind, FitResult, LinearFit, PowerLawFit};
pub use loader::{Panel, WorldDataset};
pub use models::{CountryMetadata, Economy, WideTable, YearRange};
pub use snapshot::{Snapshot, full_snapshot, snapshot, with_region_names};
pub use source::{DataSource, InMemorySource, WorldBankClient};
