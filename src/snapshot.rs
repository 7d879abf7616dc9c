//! Single-year snapshots of the panel.
//!
//! A snapshot is a derived, read-only table: the panel rows for one year,
//! optionally restricted to complete cases on some indicators, optionally
//! enriched with country names and display regions. Every operation here
//! returns a new `Snapshot`; none modifies its input.

use crate::catalog::{
    COUNTRY_COLUMN, META_ID_COLUMN, META_REGION_COLUMN, REGION_NAME_COLUMN, RegionNames,
    YEAR_COLUMN,
};
use crate::error::{DashboardError, Result};
use crate::loader::{Panel, WorldDataset};
use crate::models::CountryMetadata;
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Panel rows for one year
#[derive(Debug, Clone)]
pub struct Snapshot {
    year: i32,
    frame: DataFrame,
}

/// Rows of `panel` for `year`, dropping rows missing any `required` column
///
/// Required columns are checked against the panel schema first, so asking
/// for an indicator the catalog never had fails with `MissingColumn`.
pub fn snapshot<S: AsRef<str>>(panel: &Panel, year: i32, required: &[S]) -> Result<Snapshot> {
    panel.require_columns(required)?;

    let complete = required
        .iter()
        .fold(col(YEAR_COLUMN).eq(lit(year)), |predicate, column| {
            predicate.and(col(column.as_ref()).is_not_null())
        });

    let frame = panel.frame().clone().lazy().filter(complete).collect()?;
    debug!(
        "Snapshot {}: {} rows ({} required columns)",
        year,
        frame.height(),
        required.len()
    );

    Ok(Snapshot { year, frame })
}

/// Left-join country metadata and resolve display regions
///
/// Adds `region`, `name` and `region_name`. Rows without a metadata match
/// are kept with null `region`/`name`; `region_name` is never null and
/// falls back to "Other".
pub fn with_region_names(
    snapshot: &Snapshot,
    meta: &CountryMetadata,
    regions: &RegionNames,
) -> Result<Snapshot> {
    let mut lazy = snapshot.frame.clone().lazy();

    if !snapshot.has_column(META_REGION_COLUMN) {
        lazy = lazy
            .left_join(
                meta.frame().clone().lazy(),
                col(COUNTRY_COLUMN),
                col(META_ID_COLUMN),
            )
            .sort_by_exprs([col(COUNTRY_COLUMN)], SortMultipleOptions::default());
    }

    let frame = lazy
        .with_column(regions.expr(META_REGION_COLUMN).alias(REGION_NAME_COLUMN))
        .collect()?;

    Ok(Snapshot {
        year: snapshot.year,
        frame,
    })
}

/// `snapshot` followed by `with_region_names`
pub fn full_snapshot<S: AsRef<str>>(
    panel: &Panel,
    year: i32,
    meta: &CountryMetadata,
    regions: &RegionNames,
    required: &[S],
) -> Result<Snapshot> {
    with_region_names(&snapshot(panel, year, required)?, meta, regions)
}

impl Snapshot {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.column(column).is_ok()
    }

    fn require(&self, column: &str) -> Result<&Column> {
        self.frame
            .column(column)
            .map_err(|_| DashboardError::missing_column(column))
    }

    /// Rows matching `predicate`
    pub fn filter(&self, predicate: Expr) -> Result<Snapshot> {
        Ok(Snapshot {
            year: self.year,
            frame: self.frame.clone().lazy().filter(predicate).collect()?,
        })
    }

    /// Keep rows whose display region is selected; no selection keeps all
    pub fn filter_regions<S: AsRef<str>>(&self, selected: &[S]) -> Result<Snapshot> {
        self.require(REGION_NAME_COLUMN)?;
        if selected.is_empty() {
            return Ok(self.clone());
        }

        let predicate = selected.iter().fold(lit(false), |predicate, region| {
            predicate.or(col(REGION_NAME_COLUMN).eq(lit(region.as_ref())))
        });
        self.filter(predicate)
    }

    /// Distinct display regions present, sorted
    pub fn region_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<&str> = self
            .require(REGION_NAME_COLUMN)?
            .str()?
            .into_iter()
            .flatten()
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    /// Numeric column values in row order
    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let values = self.require(column)?.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    }

    /// Text column values in row order
    pub fn strings(&self, column: &str) -> Result<Vec<Option<String>>> {
        Ok(self
            .require(column)?
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// (x, y) from rows where both columns are present
    pub fn pairs(&self, x: &str, y: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        Ok(self
            .values(x)?
            .into_iter()
            .zip(self.values(y)?)
            .filter_map(|pair| match pair {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            })
            .unzip())
    }

    /// Mean over non-missing values; `None` when there are none
    pub fn mean(&self, column: &str) -> Result<Option<f64>> {
        let present: Vec<f64> = self.values(column)?.into_iter().flatten().collect();
        if present.is_empty() {
            return Ok(None);
        }
        Ok(Some(present.iter().sum::<f64>() / present.len() as f64))
    }

    /// Smallest non-missing value
    pub fn min(&self, column: &str) -> Result<Option<f64>> {
        Ok(self
            .values(column)?
            .into_iter()
            .flatten()
            .min_by(|a, b| a.total_cmp(b)))
    }

    /// Largest non-missing value
    pub fn max(&self, column: &str) -> Result<Option<f64>> {
        Ok(self
            .values(column)?
            .into_iter()
            .flatten()
            .max_by(|a, b| a.total_cmp(b)))
    }
}

impl WorldDataset {
    /// Rows for `year` with complete `required` columns
    pub fn snapshot<S: AsRef<str>>(&self, year: i32, required: &[S]) -> Result<Snapshot> {
        snapshot(self.panel(), year, required)
    }

    /// Snapshot with country names and display regions
    pub fn full_snapshot<S: AsRef<str>>(&self, year: i32, required: &[S]) -> Result<Snapshot> {
        full_snapshot(
            self.panel(),
            year,
            self.meta(),
            &RegionNames::default(),
            required,
        )
    }

    /// Country names and display regions for an existing snapshot
    pub fn add_region_names(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        with_region_names(snapshot, self.meta(), &RegionNames::default())
    }
}
