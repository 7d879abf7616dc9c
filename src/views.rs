//! Dashboard pages as view-models.
//!
//! Each view composes the same pipeline: full snapshot for a year with the
//! page's columns required, optional region filter, optional curve fit, and
//! the summary numbers the page reports. Views only read the dataset.

use crate::catalog::{
    COUNTRY_COLUMN, META_NAME_COLUMN, REGION_NAME_COLUMN, indicators,
};
use crate::error::{DashboardError, Result};
use crate::fit::{DEFAULT_CURVE_POINTS, FitKind, FitResult};
use crate::loader::WorldDataset;
use crate::snapshot::Snapshot;
use polars::prelude::*;
use tracing::{debug, warn};

/// Upper bound of the energy axis on the energy charts, kWh per capita
pub const ENERGY_AXIS_MAX_KWH: f64 = 220_000.0;

/// Countries shown on the low-carbon ranking by default
pub const DEFAULT_TOP_COUNTRIES: usize = 20;

/// Column added to the low-carbon table
pub const LOW_CARBON_TOTAL_COLUMN: &str = "low_carbon_share";

// =============================================================================
// Shared Pieces
// =============================================================================

/// One country on a scatter chart
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub country_code: String,
    pub name: Option<String>,
    pub region_name: String,
    pub x: f64,
    pub y: f64,
}

impl ScatterPoint {
    /// Display name, falling back to the country code
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.country_code)
    }
}

/// Sampled fitted curve
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn sample(fit: &FitResult, x_min: f64, x_max: f64) -> Self {
        let (x, y) = fit.curve(x_min, x_max, DEFAULT_CURVE_POINTS);
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Controls shared by the scatter pages
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScatterRequest {
    pub year: i32,
    /// Display regions to keep; empty keeps every region
    pub regions: Vec<String>,
    /// Overlay the page's regression curve
    pub fit: bool,
}

impl ScatterRequest {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_fit(mut self, fit: bool) -> Self {
        self.fit = fit;
        self
    }
}

/// Full snapshot for `year` with `required` complete, then region filtered
fn filtered_snapshot(
    dataset: &WorldDataset,
    year: i32,
    required: &[&str],
    regions: &[String],
) -> Result<Snapshot> {
    let snapshot = dataset.full_snapshot(year, required)?;
    let filtered = snapshot.filter_regions(regions)?;
    debug!(
        "Year {}: {} of {} rows after region filter",
        year,
        filtered.height(),
        snapshot.height()
    );
    Ok(filtered)
}

/// Points of an enriched snapshot for two complete columns
fn scatter_points(snapshot: &Snapshot, x: &str, y: &str) -> Result<Vec<ScatterPoint>> {
    let codes = snapshot.strings(COUNTRY_COLUMN)?;
    let names = snapshot.strings(META_NAME_COLUMN)?;
    let regions = snapshot.strings(REGION_NAME_COLUMN)?;
    let xs = snapshot.values(x)?;
    let ys = snapshot.values(y)?;

    let points = codes
        .into_iter()
        .zip(names)
        .zip(regions)
        .zip(xs.into_iter().zip(ys))
        .filter_map(|(((code, name), region), values)| match (code, values) {
            (Some(country_code), (Some(x), Some(y))) => Some(ScatterPoint {
                country_code,
                name,
                region_name: region.unwrap_or_default(),
                x,
                y,
            }),
            _ => None,
        })
        .collect();

    Ok(points)
}

/// Fit when requested and possible
///
/// An empty selection gives no fit; too few usable points is logged and also
/// gives no fit so the rest of the page still renders.
fn optional_fit(kind: FitKind, requested: bool, x: &[f64], y: &[f64]) -> Result<Option<FitResult>> {
    if !requested || x.is_empty() {
        return Ok(None);
    }

    match FitResult::fit(kind, x, y) {
        Ok(fit) => Ok(Some(fit)),
        Err(DashboardError::InsufficientData { required, found }) => {
            warn!(
                "Skipping {:?} fit: {} distinct x values, {} required",
                kind, found, required
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn scatter_frame(snapshot: &Snapshot, x: &str, y: &str) -> Result<DataFrame> {
    Ok(snapshot
        .frame()
        .select([COUNTRY_COLUMN, META_NAME_COLUMN, REGION_NAME_COLUMN, x, y])?)
}

// =============================================================================
// Life Expectancy vs Energy
// =============================================================================

/// Life expectancy against energy use, with an optional Cobb–Douglas curve
#[derive(Debug, Clone)]
pub struct LifeExpectancyView {
    pub year: i32,
    pub points: Vec<ScatterPoint>,
    pub fit: Option<FitResult>,
    /// Curve over the whole energy axis when fitted
    pub curve: Option<Curve>,
    pub mean_energy: Option<f64>,
    pub mean_life_expectancy: Option<f64>,
    snapshot: Snapshot,
}

impl LifeExpectancyView {
    pub const X: &'static str = indicators::ENERGY_USE_PER_CAPITA;
    pub const Y: &'static str = indicators::LIFE_EXPECTANCY;

    pub fn build(dataset: &WorldDataset, request: &ScatterRequest) -> Result<Self> {
        let snapshot = filtered_snapshot(dataset, request.year, &[Self::X, Self::Y], &request.regions)?;
        let points = scatter_points(&snapshot, Self::X, Self::Y)?;

        let x: Vec<f64> = points.iter().map(|p| p.x).collect();
        let y: Vec<f64> = points.iter().map(|p| p.y).collect();
        let fit = optional_fit(FitKind::PowerLaw, request.fit, &x, &y)?;
        let curve = fit
            .as_ref()
            .map(|fit| Curve::sample(fit, 0.0, ENERGY_AXIS_MAX_KWH));

        Ok(Self {
            year: request.year,
            mean_energy: mean(x),
            mean_life_expectancy: mean(y),
            points,
            fit,
            curve,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        scatter_frame(&self.snapshot, Self::X, Self::Y)
    }
}

// =============================================================================
// Energy vs Emissions
// =============================================================================

/// CO₂ emissions against energy use, with an optional linear fit
#[derive(Debug, Clone)]
pub struct EmissionsView {
    pub year: i32,
    pub points: Vec<ScatterPoint>,
    pub fit: Option<FitResult>,
    /// Curve over the observed energy range when fitted
    pub curve: Option<Curve>,
    snapshot: Snapshot,
}

impl EmissionsView {
    pub const X: &'static str = indicators::ENERGY_USE_PER_CAPITA;
    pub const Y: &'static str = indicators::CO2_PER_CAPITA;

    pub fn build(dataset: &WorldDataset, request: &ScatterRequest) -> Result<Self> {
        let snapshot = filtered_snapshot(dataset, request.year, &[Self::X, Self::Y], &request.regions)?;
        let points = scatter_points(&snapshot, Self::X, Self::Y)?;

        let x: Vec<f64> = points.iter().map(|p| p.x).collect();
        let y: Vec<f64> = points.iter().map(|p| p.y).collect();
        let fit = optional_fit(FitKind::Linear, request.fit, &x, &y)?;

        let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let curve = fit.as_ref().map(|fit| Curve::sample(fit, x_min, x_max));

        Ok(Self {
            year: request.year,
            points,
            fit,
            curve,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        scatter_frame(&self.snapshot, Self::X, Self::Y)
    }
}

// =============================================================================
// Energy Threshold
// =============================================================================

/// Controls for the energy threshold page
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRequest {
    pub scatter: ScatterRequest,
    /// Life expectancy a country must reach, in years
    pub min_life_expectancy: f64,
}

impl ThresholdRequest {
    pub fn new(year: i32, min_life_expectancy: f64) -> Self {
        Self {
            scatter: ScatterRequest::new(year),
            min_life_expectancy,
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.scatter.regions = regions;
        self
    }

    pub fn with_fit(mut self, fit: bool) -> Self {
        self.scatter.fit = fit;
        self
    }
}

/// Least energy use that reaches a life expectancy threshold
#[derive(Debug, Clone)]
pub struct EnergyThresholdView {
    pub year: i32,
    pub min_life_expectancy: f64,
    /// Countries at or above the threshold
    pub eligible: Vec<ScatterPoint>,
    /// Display names of every country tied at the minimum energy
    pub best_countries: Vec<String>,
    pub min_energy: Option<f64>,
    pub mean_energy: Option<f64>,
    /// Cobb–Douglas fit over the whole filtered snapshot
    pub fit: Option<FitResult>,
    pub curve: Option<Curve>,
    eligible_snapshot: Snapshot,
}

impl EnergyThresholdView {
    pub const X: &'static str = indicators::ENERGY_USE_PER_CAPITA;
    pub const Y: &'static str = indicators::LIFE_EXPECTANCY;

    pub fn build(dataset: &WorldDataset, request: &ThresholdRequest) -> Result<Self> {
        let scatter = &request.scatter;
        if !request.min_life_expectancy.is_finite() {
            return Err(DashboardError::InvalidInput {
                message: format!(
                    "Life expectancy threshold {} is not a number",
                    request.min_life_expectancy
                ),
            });
        }

        // Step 1: Filtered snapshot and the fit over all of it
        let snapshot = filtered_snapshot(dataset, scatter.year, &[Self::X, Self::Y], &scatter.regions)?;
        let (x, y) = snapshot.pairs(Self::X, Self::Y)?;
        let fit = optional_fit(FitKind::PowerLaw, scatter.fit, &x, &y)?;
        let curve = fit
            .as_ref()
            .map(|fit| Curve::sample(fit, 0.0, ENERGY_AXIS_MAX_KWH));

        // Step 2: Countries reaching the threshold
        let eligible_snapshot =
            snapshot.filter(col(Self::Y).gt_eq(lit(request.min_life_expectancy)))?;
        let eligible = scatter_points(&eligible_snapshot, Self::X, Self::Y)?;

        // Step 3: Minimum energy and every country attaining it
        let min_energy = eligible
            .iter()
            .map(|p| p.x)
            .min_by(|a, b| a.total_cmp(b));
        let best_countries = match min_energy {
            Some(min) => eligible
                .iter()
                .filter(|p| p.x == min)
                .map(|p| p.label().to_string())
                .collect(),
            None => Vec::new(),
        };

        debug!(
            "Threshold {} years in {}: {} eligible countries",
            request.min_life_expectancy,
            scatter.year,
            eligible.len()
        );

        Ok(Self {
            year: scatter.year,
            min_life_expectancy: request.min_life_expectancy,
            mean_energy: mean(eligible.iter().map(|p| p.x)),
            best_countries,
            min_energy,
            eligible,
            fit,
            curve,
            eligible_snapshot,
        })
    }

    pub fn eligible_count(&self) -> usize {
        self.eligible.len()
    }

    /// Eligible countries as a table
    pub fn to_frame(&self) -> Result<DataFrame> {
        scatter_frame(&self.eligible_snapshot, Self::X, Self::Y)
    }
}

// =============================================================================
// Low-Carbon Electricity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowCarbonRequest {
    pub year: i32,
    pub top: usize,
}

impl LowCarbonRequest {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            top: DEFAULT_TOP_COUNTRIES,
        }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }
}

/// One bar of the stacked low-carbon chart
#[derive(Debug, Clone, PartialEq)]
pub struct LowCarbonRow {
    pub country_code: String,
    pub name: String,
    pub region_name: String,
    /// Nuclear share of electricity production, percent
    pub nuclear: f64,
    /// Renewable share excluding hydro, percent
    pub renewables: f64,
    pub total: f64,
}

/// Countries ranked by nuclear plus non-hydro renewable electricity share
#[derive(Debug, Clone)]
pub struct LowCarbonView {
    pub year: i32,
    /// Highest total first, at most `top` rows
    pub rows: Vec<LowCarbonRow>,
}

impl LowCarbonView {
    pub const NUCLEAR: &'static str = indicators::NUCLEAR_SHARE;
    pub const RENEWABLES: &'static str = indicators::RENEWABLE_SHARE_NOHYDRO;

    pub fn build(dataset: &WorldDataset, request: &LowCarbonRequest) -> Result<Self> {
        let snapshot = dataset.full_snapshot(request.year, &[Self::NUCLEAR, Self::RENEWABLES])?;

        let mut rows: Vec<LowCarbonRow> = scatter_points(&snapshot, Self::NUCLEAR, Self::RENEWABLES)?
            .into_iter()
            .map(|point| LowCarbonRow {
                name: point.label().to_string(),
                country_code: point.country_code,
                region_name: point.region_name,
                nuclear: point.x,
                renewables: point.y,
                total: point.x + point.y,
            })
            .collect();

        // Highest total first; ties broken by name for a stable ranking
        rows.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        rows.truncate(request.top);

        if rows.is_empty() {
            warn!("No low-carbon electricity data for {}", request.year);
        }

        Ok(Self {
            year: request.year,
            rows,
        })
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let columns = vec![
            Column::new(
                COUNTRY_COLUMN.into(),
                self.rows.iter().map(|r| r.country_code.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                META_NAME_COLUMN.into(),
                self.rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                REGION_NAME_COLUMN.into(),
                self.rows.iter().map(|r| r.region_name.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                Self::NUCLEAR.into(),
                self.rows.iter().map(|r| r.nuclear).collect::<Vec<f64>>(),
            ),
            Column::new(
                Self::RENEWABLES.into(),
                self.rows.iter().map(|r| r.renewables).collect::<Vec<f64>>(),
            ),
            Column::new(
                LOW_CARBON_TOTAL_COLUMN.into(),
                self.rows.iter().map(|r| r.total).collect::<Vec<f64>>(),
            ),
        ];
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndicatorCatalog, KGOE_TO_KWH};
    use crate::loader::Panel;
    use crate::models::{CountryMetadata, Economy, WideTable, YearRange};

    /// Energy is given in kWh and divided back so the panel holds round numbers
    fn kgoe(kwh: f64) -> Option<f64> {
        Some(kwh / KGOE_TO_KWH)
    }

    fn test_dataset() -> WorldDataset {
        let meta = CountryMetadata::from_economies(vec![
            Economy::country("FRA", "France", Some("ECS")),
            Economy::country("DEU", "Germany", Some("ECS")),
            Economy::country("KEN", "Kenya", Some("SSF")),
            Economy::country("IND", "India", Some("SAS")),
            Economy::country("XKX", "Kosovo", Some("ZZZ")),
        ])
        .unwrap();
        let catalog = IndicatorCatalog::default();

        let mut table = WideTable::new(vec!["YR2020".to_string()]);
        let rows: [(&str, f64, f64, f64, f64, f64); 4] = [
            // code, energy kWh, life, co2, nuclear, renewables
            ("FRA", 40_000.0, 82.0, 4.5, 67.0, 10.0),
            ("DEU", 40_000.0, 81.0, 8.0, 11.0, 40.0),
            ("KEN", 6_000.0, 62.0, 0.4, 0.0, 45.0),
            ("IND", 7_000.0, 70.0, 1.9, 3.0, 9.0),
        ];
        for (code, energy, life, co2, nuclear, renewables) in rows {
            table.push_row(code, "EG.USE.PCAP.KG.OE", vec![kgoe(energy)]);
            table.push_row(code, "SP.DYN.LE00.IN", vec![Some(life)]);
            table.push_row(code, "EN.GHG.CO2.PC.CE.AR5", vec![Some(co2)]);
            table.push_row(code, "EG.ELC.NUCL.ZS", vec![Some(nuclear)]);
            table.push_row(code, "EG.ELC.RNWX.ZS", vec![Some(renewables)]);
        }
        // Kosovo reports energy only
        table.push_row("XKX", "EG.USE.PCAP.KG.OE", vec![kgoe(9_000.0)]);

        let panel = Panel::from_wide(&table, &catalog, &meta).unwrap();
        WorldDataset::from_parts(panel, meta, catalog, YearRange::new(2020, 2020).unwrap())
    }

    #[test]
    fn test_life_expectancy_view() {
        let dataset = test_dataset();
        let view =
            LifeExpectancyView::build(&dataset, &ScatterRequest::new(2020).with_fit(true)).unwrap();

        assert_eq!(view.points.len(), 4);
        let mean_life = view.mean_life_expectancy.unwrap();
        assert!((mean_life - (82.0 + 81.0 + 62.0 + 70.0) / 4.0).abs() < 1e-9);

        let fit = view.fit.unwrap();
        assert_eq!(fit.kind(), FitKind::PowerLaw);
        let curve = view.curve.as_ref().unwrap();
        assert_eq!(curve.len(), DEFAULT_CURVE_POINTS);
        assert_eq!(curve.x[0], 0.0);
        assert_eq!(curve.x[DEFAULT_CURVE_POINTS - 1], ENERGY_AXIS_MAX_KWH);

        let frame = view.to_frame().unwrap();
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.width(), 5);
    }

    #[test]
    fn test_region_filter_and_no_fit() {
        let dataset = test_dataset();
        let request =
            ScatterRequest::new(2020).with_regions(vec!["Europe & Central Asia".to_string()]);
        let view = LifeExpectancyView::build(&dataset, &request).unwrap();

        assert_eq!(view.points.len(), 2);
        assert!(view.points.iter().all(|p| p.region_name == "Europe & Central Asia"));
        assert!(view.fit.is_none());
        assert!(view.curve.is_none());
    }

    #[test]
    fn test_fit_skipped_for_single_point() {
        let dataset = test_dataset();
        let request = ScatterRequest::new(2020)
            .with_regions(vec!["South Asia".to_string()])
            .with_fit(true);
        let view = EmissionsView::build(&dataset, &request).unwrap();

        assert_eq!(view.points.len(), 1);
        assert!(view.fit.is_none());
    }

    #[test]
    fn test_emissions_curve_spans_observed_range() {
        let dataset = test_dataset();
        let view =
            EmissionsView::build(&dataset, &ScatterRequest::new(2020).with_fit(true)).unwrap();

        let curve = view.curve.unwrap();
        assert!((curve.x[0] - 6_000.0).abs() < 1e-6);
        assert!((curve.x[curve.len() - 1] - 40_000.0).abs() < 1e-6);
        assert_eq!(view.fit.unwrap().kind(), FitKind::Linear);
    }

    #[test]
    fn test_threshold_picks_all_tied_countries() {
        let dataset = test_dataset();
        let view = EnergyThresholdView::build(&dataset, &ThresholdRequest::new(2020, 80.0)).unwrap();

        assert_eq!(view.eligible_count(), 2);
        assert_eq!(view.best_countries, vec!["Germany", "France"]);
        assert!((view.min_energy.unwrap() - 40_000.0).abs() < 1e-6);
        assert!((view.mean_energy.unwrap() - 40_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_single_best_and_fit_on_all_rows() {
        let dataset = test_dataset();
        let view =
            EnergyThresholdView::build(&dataset, &ThresholdRequest::new(2020, 65.0).with_fit(true))
                .unwrap();

        assert_eq!(view.eligible_count(), 3);
        assert_eq!(view.best_countries, vec!["India"]);
        assert_eq!(view.fit.unwrap().points(), 4);
        assert_eq!(view.to_frame().unwrap().height(), 3);
    }

    #[test]
    fn test_threshold_unreachable() {
        let dataset = test_dataset();
        let view = EnergyThresholdView::build(&dataset, &ThresholdRequest::new(2020, 90.0)).unwrap();

        assert_eq!(view.eligible_count(), 0);
        assert!(view.best_countries.is_empty());
        assert_eq!(view.min_energy, None);
        assert_eq!(view.mean_energy, None);
    }

    #[test]
    fn test_low_carbon_ranking() {
        let dataset = test_dataset();
        let view = LowCarbonView::build(&dataset, &LowCarbonRequest::new(2020).with_top(3)).unwrap();

        let names: Vec<&str> = view.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["France", "Germany", "Kenya"]);
        assert!((view.rows[0].total - 77.0).abs() < 1e-9);

        let frame = view.to_frame().unwrap();
        assert_eq!(frame.height(), 3);
        assert!(frame.column(LOW_CARBON_TOTAL_COLUMN).is_ok());
    }

    #[test]
    fn test_views_report_missing_columns() {
        let meta =
            CountryMetadata::from_economies(vec![Economy::country("FRA", "France", Some("ECS"))])
                .unwrap();
        let catalog = IndicatorCatalog::new([("life_expectancy", "SP.DYN.LE00.IN")]).unwrap();
        let panel = Panel::from_wide(&WideTable::new(vec!["YR2020".to_string()]), &catalog, &meta)
            .unwrap();
        let dataset =
            WorldDataset::from_parts(panel, meta, catalog, YearRange::new(2020, 2020).unwrap());

        match LowCarbonView::build(&dataset, &LowCarbonRequest::new(2020)) {
            Err(DashboardError::MissingColumn { column }) => {
                assert_eq!(column, indicators::NUCLEAR_SHARE)
            }
            other => panic!("expected missing column, got {:?}", other),
        }
        assert!(
            EmissionsView::build(&dataset, &ScatterRequest::new(2020))
                .unwrap_err()
                .is_missing_column()
        );
    }
}
