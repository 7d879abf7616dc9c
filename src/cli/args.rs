//! Command-line argument definitions for the world dashboard
//!
//! This module defines the complete CLI interface using clap derive API.
//! Each dashboard page is a subcommand; options shared by every command
//! (verbosity, config file, API and year overrides) are global.

use crate::config::{CompressionAlgorithm, DashboardConfig};
use crate::error::{DashboardError, Result};
use crate::models::YearRange;
use crate::views::DEFAULT_TOP_COUNTRIES;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Year shown when `--year` is not given
pub const DEFAULT_YEAR: i32 = 2022;

/// Life expectancy threshold used when none is given, in years
pub const DEFAULT_MIN_LIFE_EXPECTANCY: f64 = 50.0;

/// CLI arguments for the world dashboard
///
/// Downloads World Bank indicators and prints the dashboard pages as
/// terminal reports, optionally exporting their tables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "world-dashboard",
    version,
    about = "Explore World Bank energy, emissions and life expectancy indicators",
    long_about = "Downloads development, energy and emissions indicators from the World Bank \
                  API, reshapes them into a per-country-per-year panel and prints the dashboard \
                  pages: life expectancy and CO2 against energy use with regression fits, the \
                  energy needed to reach a life expectancy threshold, and the low-carbon \
                  electricity ranking."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    ///
    /// JSON file with any subset of the configuration fields; absent fields
    /// keep their defaults.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "Path to configuration file (JSON format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Override the World Bank API base URL
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// First year of the downloaded panel
    #[arg(long = "start-year", value_name = "YEAR", global = true)]
    pub start_year: Option<i32>,

    /// Last year of the downloaded panel
    #[arg(long = "end-year", value_name = "YEAR", global = true)]
    pub end_year: Option<i32>,

    /// Parquet compression for exported tables
    #[arg(long = "compression", value_enum, global = true)]
    pub compression: Option<CompressionArg>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings and hides the spinner.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print the indicator catalog
    Indicators,
    /// Life expectancy against energy use, with an optional Cobb–Douglas fit
    LifeExpectancy(ScatterArgs),
    /// CO2 emissions against energy use, with an optional linear fit
    Emissions(ScatterArgs),
    /// Least energy use reaching a life expectancy threshold
    Threshold(ThresholdArgs),
    /// Countries ranked by nuclear plus non-hydro renewable electricity share
    LowCarbon(LowCarbonArgs),
    /// Write a full snapshot to CSV or Parquet
    Export(ExportArgs),
}

/// Options shared by the scatter pages
#[derive(Debug, Clone, ClapArgs)]
pub struct ScatterArgs {
    /// Year to show
    #[arg(short = 'y', long = "year", default_value_t = DEFAULT_YEAR)]
    pub year: i32,

    /// Only show countries in this display region (repeatable)
    ///
    /// For example "Sub-Saharan Africa" or "Other". Without this flag every
    /// region is shown.
    #[arg(short = 'r', long = "region", value_name = "NAME")]
    pub regions: Vec<String>,

    /// Overlay the page's regression fit
    #[arg(long = "fit")]
    pub fit: bool,

    /// Also write the plotted table to a .csv or .parquet file
    #[arg(long = "export", value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ThresholdArgs {
    #[command(flatten)]
    pub scatter: ScatterArgs,

    /// Life expectancy a country must reach, in years
    #[arg(
        short = 't',
        long = "min-life-expectancy",
        value_name = "YEARS",
        default_value_t = DEFAULT_MIN_LIFE_EXPECTANCY
    )]
    pub min_life_expectancy: f64,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct LowCarbonArgs {
    /// Year to show
    #[arg(short = 'y', long = "year", default_value_t = DEFAULT_YEAR)]
    pub year: i32,

    /// Number of countries in the ranking
    #[arg(long = "top", value_name = "N", default_value_t = DEFAULT_TOP_COUNTRIES)]
    pub top: usize,

    /// Also write the ranking to a .csv or .parquet file
    #[arg(long = "export", value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ExportArgs {
    /// Year to export
    #[arg(short = 'y', long = "year", default_value_t = DEFAULT_YEAR)]
    pub year: i32,

    /// Destination file; the extension selects CSV or Parquet
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: PathBuf,

    /// Drop rows missing this indicator (repeatable)
    #[arg(long = "require", value_name = "INDICATOR")]
    pub require: Vec<String>,
}

/// Parquet compression choices on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    Snappy,
    Zstd,
    Lz4,
    None,
}

impl From<CompressionArg> for CompressionAlgorithm {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Snappy => CompressionAlgorithm::Snappy,
            CompressionArg::Zstd => CompressionAlgorithm::Zstd,
            CompressionArg::Lz4 => CompressionAlgorithm::Lz4,
            CompressionArg::None => CompressionAlgorithm::Uncompressed,
        }
    }
}

impl Args {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress spinners (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Build the configuration: defaults, then the config file, then flags
    pub fn load_config(&self) -> Result<DashboardConfig> {
        let mut config = match &self.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(DashboardError::configuration(format!(
                        "Config file does not exist: {}",
                        path.display()
                    )));
                }
                DashboardConfig::from_file(path)?
            }
            None => DashboardConfig::default(),
        };

        if let Some(url) = &self.api_base_url {
            config = config.with_api_base_url(url.clone());
        }
        if self.start_year.is_some() || self.end_year.is_some() {
            let years = YearRange::new(
                self.start_year.unwrap_or(config.years.start),
                self.end_year.unwrap_or(config.years.end),
            )?;
            config = config.with_years(years);
        }
        if let Some(compression) = self.compression {
            config = config.with_export_compression(compression.into());
        }

        config.validate()?;
        Ok(config)
    }
}
