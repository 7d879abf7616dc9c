//! Command implementations for the world dashboard CLI
//!
//! This module contains the command execution logic: logging setup,
//! configuration layering, loading the panel behind a spinner, building the
//! requested page and rendering or exporting it.

use crate::cache::DatasetCache;
use crate::cli::args::{Args, Commands, ExportArgs, LowCarbonArgs, ScatterArgs, ThresholdArgs};
use crate::cli::report;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::export;
use crate::loader::WorldDataset;
use crate::source::WorldBankClient;
use crate::views::{
    EmissionsView, EnergyThresholdView, LifeExpectancyView, LowCarbonRequest, LowCarbonView,
    ScatterRequest, ThresholdRequest,
};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Main command runner
///
/// This function orchestrates a single invocation:
/// 1. Set up logging and configuration
/// 2. Load the panel once for the configured catalog and years
/// 3. Build the requested page and render it
/// 4. Export the page's table when asked to
pub async fn run(args: Args) -> anyhow::Result<()> {
    setup_logging(&args)?;
    let config = args.load_config().context("Invalid configuration")?;
    debug!("Configuration: {:?}", config);

    let Some(command) = args.command.clone() else {
        return Ok(());
    };

    let context = CommandContext::new(config, args.show_progress());
    let page = command_name(&command);

    let result = match command {
        Commands::Indicators => {
            report::print_catalog(&context.config.indicators);
            Ok(())
        }
        Commands::LifeExpectancy(scatter) => context.life_expectancy(&scatter).await,
        Commands::Emissions(scatter) => context.emissions(&scatter).await,
        Commands::Threshold(threshold) => context.threshold(&threshold).await,
        Commands::LowCarbon(low_carbon) => context.low_carbon(&low_carbon).await,
        Commands::Export(export_args) => context.export(&export_args).await,
    };

    match result {
        // Pages tolerate catalogs without their indicators
        Err(DashboardError::MissingColumn { column }) => {
            warn!("{} skipped: indicator '{}' is not loaded", page, column);
            report::print_missing_column(page, &column);
            Ok(())
        }
        other => other.with_context(|| format!("{} failed", page)),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Indicators => "indicators",
        Commands::LifeExpectancy(_) => "life-expectancy",
        Commands::Emissions(_) => "emissions",
        Commands::Threshold(_) => "threshold",
        Commands::LowCarbon(_) => "low-carbon",
        Commands::Export(_) => "export",
    }
}

/// Set up logging based on command line arguments
fn setup_logging(args: &Args) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    // Create filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("world_dashboard={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Spinner shown while the panel downloads
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// State shared by the page commands of one invocation
struct CommandContext {
    config: DashboardConfig,
    cache: DatasetCache<WorldBankClient>,
    show_progress: bool,
}

impl CommandContext {
    fn new(config: DashboardConfig, show_progress: bool) -> Self {
        let cache = DatasetCache::new(WorldBankClient::from_config(&config));
        Self {
            config,
            cache,
            show_progress,
        }
    }

    /// Panel for the configured catalog and years
    async fn dataset(&self) -> Result<Arc<WorldDataset>> {
        let start_time = Instant::now();
        let spinner = self.show_progress.then(|| {
            create_spinner(&format!(
                "Downloading {} indicators for {}...",
                self.config.indicators.len(),
                self.config.years
            ))
        });

        let result = self
            .cache
            .get_or_load(&self.config.indicators, self.config.years)
            .await;

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        if result.is_ok() {
            info!(
                "Panel ready in {:.1}s",
                start_time.elapsed().as_secs_f64()
            );
        }
        result
    }

    fn check_year(&self, year: i32) -> Result<()> {
        if !self.config.years.contains(year) {
            return Err(DashboardError::InvalidInput {
                message: format!(
                    "Year {} is outside the loaded range {}",
                    year, self.config.years
                ),
            });
        }
        Ok(())
    }

    fn export_frame(&self, mut frame: DataFrame, path: &Path) -> Result<()> {
        let rows = export::write_frame(&mut frame, path, self.config.export_compression)?;
        report::print_export(rows, path);
        Ok(())
    }

    async fn life_expectancy(&self, args: &ScatterArgs) -> Result<()> {
        self.check_year(args.year)?;
        let dataset = self.dataset().await?;

        let view = LifeExpectancyView::build(&dataset, &scatter_request(args))?;
        report::print_life_expectancy(&view);

        if let Some(path) = &args.export {
            self.export_frame(view.to_frame()?, path)?;
        }
        Ok(())
    }

    async fn emissions(&self, args: &ScatterArgs) -> Result<()> {
        self.check_year(args.year)?;
        let dataset = self.dataset().await?;

        let view = EmissionsView::build(&dataset, &scatter_request(args))?;
        report::print_emissions(&view);

        if let Some(path) = &args.export {
            self.export_frame(view.to_frame()?, path)?;
        }
        Ok(())
    }

    async fn threshold(&self, args: &ThresholdArgs) -> Result<()> {
        self.check_year(args.scatter.year)?;
        let dataset = self.dataset().await?;

        let request = ThresholdRequest::new(args.scatter.year, args.min_life_expectancy)
            .with_regions(args.scatter.regions.clone())
            .with_fit(args.scatter.fit);
        let view = EnergyThresholdView::build(&dataset, &request)?;
        report::print_threshold(&view);

        if let Some(path) = &args.scatter.export {
            self.export_frame(view.to_frame()?, path)?;
        }
        Ok(())
    }

    async fn low_carbon(&self, args: &LowCarbonArgs) -> Result<()> {
        self.check_year(args.year)?;
        let dataset = self.dataset().await?;

        let request = LowCarbonRequest::new(args.year).with_top(args.top);
        let view = LowCarbonView::build(&dataset, &request)?;
        report::print_low_carbon(&view);

        if let Some(path) = &args.export {
            self.export_frame(view.to_frame()?, path)?;
        }
        Ok(())
    }

    async fn export(&self, args: &ExportArgs) -> Result<()> {
        self.check_year(args.year)?;
        let dataset = self.dataset().await?;

        let snapshot = dataset.full_snapshot(args.year, args.require.as_slice())?;
        self.export_frame(snapshot.into_frame(), &args.output)
    }
}

fn scatter_request(args: &ScatterArgs) -> ScatterRequest {
    ScatterRequest::new(args.year)
        .with_regions(args.regions.clone())
        .with_fit(args.fit)
}
