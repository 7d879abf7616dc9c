//! Dataset loading and reshaping.
//!
//! Turns the source's wide indicator table into the normalized panel: one
//! row per (country, year), one column per catalog key. Steps, in order:
//!
//! 1. drop year columns outside the requested range
//! 2. melt the wide table into long observations, parsing year labels
//! 3. relabel series codes to indicator keys
//! 4. pivot observed values into panel rows, rejecting duplicates
//! 5. drop economies missing from the country metadata (aggregates)
//! 6. convert energy use from kg of oil equivalent to kWh

use crate::catalog::{
    COUNTRY_COLUMN, IndicatorCatalog, KGOE_TO_KWH, YEAR_COLUMN, indicators,
};
use crate::error::{DashboardError, Result};
use crate::models::{CountryMetadata, Observation, WideTable, YearRange};
use crate::source::DataSource;
use polars::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Optional non-numeric prefix followed by the year digits
static YEAR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^0-9]*([0-9]+)$").expect("year label pattern is valid"));

/// Parse a source year label such as "YR2010" or "2010"
pub fn parse_year_label(label: &str) -> Result<i32> {
    YEAR_LABEL
        .captures(label.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or_else(|| DashboardError::malformed(format!("Unparseable year label '{}'", label)))
}

// =============================================================================
// Reshaping
// =============================================================================

/// Keep only the year columns inside `years`
///
/// Sources may answer with more years than were asked for; those columns
/// never reach the panel.
pub fn restrict_years(table: &WideTable, years: YearRange) -> Result<WideTable> {
    let mut keep = Vec::with_capacity(table.year_labels.len());
    let mut dropped = Vec::new();
    for (i, label) in table.year_labels.iter().enumerate() {
        if years.contains(parse_year_label(label)?) {
            keep.push(i);
        } else {
            dropped.push(label.as_str());
        }
    }

    if dropped.is_empty() {
        return Ok(table.clone());
    }
    warn!(
        "Dropping year columns outside {}: {}",
        years,
        dropped.join(", ")
    );

    let mut restricted =
        WideTable::new(keep.iter().map(|i| table.year_labels[*i].clone()).collect());
    for row in &table.rows {
        if row.values.len() != table.year_labels.len() {
            return Err(DashboardError::malformed(format!(
                "Row ({}, {}) has {} values for {} year columns",
                row.economy,
                row.series,
                row.values.len(),
                table.year_labels.len()
            )));
        }
        restricted.push_row(
            row.economy.clone(),
            row.series.clone(),
            keep.iter().map(|i| row.values[*i]).collect(),
        );
    }
    Ok(restricted)
}

/// Wide (economy, series) × year rows into long observations
///
/// Missing values are kept as `None`; the pivot decides what to do with them.
pub fn melt(table: &WideTable) -> Result<Vec<Observation>> {
    let years = table
        .year_labels
        .iter()
        .map(|label| parse_year_label(label))
        .collect::<Result<Vec<i32>>>()?;

    let mut observations = Vec::with_capacity(table.rows.len() * years.len());
    for row in &table.rows {
        if row.values.len() != years.len() {
            return Err(DashboardError::malformed(format!(
                "Row ({}, {}) has {} values for {} year columns",
                row.economy,
                row.series,
                row.values.len(),
                years.len()
            )));
        }

        for (year, value) in years.iter().zip(&row.values) {
            observations.push(Observation {
                economy: row.economy.clone(),
                series: row.series.clone(),
                year: *year,
                value: *value,
            });
        }
    }

    debug!(
        "Melted {} wide rows into {} observations",
        table.rows.len(),
        observations.len()
    );
    Ok(observations)
}

/// Replace series codes with indicator keys
pub fn relabel(
    observations: Vec<Observation>,
    catalog: &IndicatorCatalog,
) -> Result<Vec<Observation>> {
    let code_to_key = catalog.code_to_key();

    observations
        .into_iter()
        .map(|mut observation| {
            let key = code_to_key.get(observation.series.as_str()).ok_or_else(|| {
                DashboardError::malformed(format!(
                    "Series '{}' was returned but not requested",
                    observation.series
                ))
            })?;
            observation.series = key.to_string();
            Ok(observation)
        })
        .collect()
}

/// Pivot relabeled observations into panel columns
///
/// Only observed values create rows, so (country, year) pairs with nothing
/// reported are absent. Economies unknown to `meta` are dropped. A second
/// value for the same cell is an error rather than being averaged away.
pub fn pivot(
    observations: &[Observation],
    catalog: &IndicatorCatalog,
    meta: &CountryMetadata,
) -> Result<DataFrame> {
    let keys: Vec<&str> = catalog.keys().collect();
    let key_index: BTreeMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let mut rows: BTreeMap<(&str, i32), Vec<Option<f64>>> = BTreeMap::new();
    let mut dropped = BTreeSet::new();

    for observation in observations {
        let Some(value) = observation.value else {
            continue;
        };

        if !meta.contains(&observation.economy) {
            dropped.insert(observation.economy.as_str());
            continue;
        }

        let column = *key_index.get(observation.series.as_str()).ok_or_else(|| {
            DashboardError::malformed(format!(
                "Observation labelled '{}' is not a catalog key",
                observation.series
            ))
        })?;

        let cells = rows
            .entry((observation.economy.as_str(), observation.year))
            .or_insert_with(|| vec![None; keys.len()]);

        if cells[column].is_some() {
            return Err(DashboardError::DuplicateObservation {
                country: observation.economy.clone(),
                year: observation.year,
                indicator: observation.series.clone(),
            });
        }
        cells[column] = Some(value);
    }

    if !dropped.is_empty() {
        debug!(
            "Dropped {} aggregate or unknown economies from the panel",
            dropped.len()
        );
    }

    let mut columns = Vec::with_capacity(keys.len() + 2);
    columns.push(Column::new(
        COUNTRY_COLUMN.into(),
        rows.keys().map(|(country, _)| *country).collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        YEAR_COLUMN.into(),
        rows.keys().map(|(_, year)| *year).collect::<Vec<i32>>(),
    ));
    for (i, key) in keys.iter().enumerate() {
        columns.push(Column::new(
            (*key).into(),
            rows.values().map(|cells| cells[i]).collect::<Vec<Option<f64>>>(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

/// Convert the energy-use column from kg of oil equivalent to kWh
fn convert_energy_units(frame: DataFrame) -> Result<DataFrame> {
    let energy = indicators::ENERGY_USE_PER_CAPITA;
    if frame.column(energy).is_err() {
        return Ok(frame);
    }

    Ok(frame
        .lazy()
        .with_column((col(energy) * lit(KGOE_TO_KWH)).alias(energy))
        .collect()?)
}

// =============================================================================
// Panel
// =============================================================================

/// Normalized (country, year) × indicator table
///
/// The column set is fixed by the catalog at construction: `country_code`,
/// `year`, then one nullable Float64 column per indicator key. Immutable.
#[derive(Debug, Clone)]
pub struct Panel {
    frame: DataFrame,
    indicators: Vec<String>,
}

impl Panel {
    /// Reshape a wide source table into a panel
    pub fn from_wide(
        table: &WideTable,
        catalog: &IndicatorCatalog,
        meta: &CountryMetadata,
    ) -> Result<Self> {
        let observations = relabel(melt(table)?, catalog)?;
        let frame = convert_energy_units(pivot(&observations, catalog, meta)?)?;

        Ok(Self {
            frame,
            indicators: catalog.keys().map(str::to_string).collect(),
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Indicator columns, in catalog order
    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == COUNTRY_COLUMN
            || column == YEAR_COLUMN
            || self.indicators.iter().any(|key| key == column)
    }

    /// Fail with `MissingColumn` naming the first absent column
    pub fn require_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c.as_ref())) {
            Some(missing) => Err(DashboardError::missing_column(missing.as_ref())),
            None => Ok(()),
        }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Distinct years present, ascending
    pub fn years(&self) -> Result<Vec<i32>> {
        let years: BTreeSet<i32> = self
            .frame
            .column(YEAR_COLUMN)?
            .i32()?
            .into_iter()
            .flatten()
            .collect();
        Ok(years.into_iter().collect())
    }

    /// Distinct country ids present, ascending
    pub fn country_ids(&self) -> Result<Vec<String>> {
        let ids: BTreeSet<&str> = self
            .frame
            .column(COUNTRY_COLUMN)?
            .str()?
            .into_iter()
            .flatten()
            .collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    /// Single cell lookup; `None` when the row or the value is missing
    pub fn value(&self, country: &str, year: i32, column: &str) -> Result<Option<f64>> {
        self.require_columns(&[column])?;

        let cell = self
            .frame
            .clone()
            .lazy()
            .filter(
                col(COUNTRY_COLUMN)
                    .eq(lit(country))
                    .and(col(YEAR_COLUMN).eq(lit(year))),
            )
            .select([col(column)])
            .collect()?;

        match cell.height() {
            0 => Ok(None),
            1 => Ok(cell.column(column)?.f64()?.get(0)),
            n => Err(DashboardError::malformed(format!(
                "{} rows for {} in {}",
                n, country, year
            ))),
        }
    }
}

// =============================================================================
// World Dataset
// =============================================================================

/// Panel plus the country metadata and catalog it was built from
#[derive(Debug, Clone)]
pub struct WorldDataset {
    panel: Panel,
    meta: CountryMetadata,
    catalog: IndicatorCatalog,
    years: YearRange,
}

impl WorldDataset {
    /// Download and reshape the panel for `catalog` over `years`
    pub async fn load<S: DataSource>(
        source: &S,
        catalog: &IndicatorCatalog,
        years: YearRange,
    ) -> Result<Self> {
        let start_time = Instant::now();

        // Step 1: Country metadata without aggregates
        let meta = CountryMetadata::from_economies(source.economies().await?)?;
        debug!("Loaded metadata for {} countries", meta.len());

        // Step 2: Raw observations in the wide shape
        let codes: Vec<String> = catalog.codes().map(str::to_string).collect();
        let table = restrict_years(&source.indicator_table(&codes, years).await?, years)?;

        // Step 3: Reshape
        let panel = Panel::from_wide(&table, catalog, &meta)?;

        info!(
            "Loaded panel: {} rows, {} indicators, {} ({}ms)",
            panel.height(),
            panel.indicators().len(),
            years,
            start_time.elapsed().as_millis()
        );

        Ok(Self {
            panel,
            meta,
            catalog: catalog.clone(),
            years,
        })
    }

    /// Assemble a dataset from already loaded parts
    pub fn from_parts(
        panel: Panel,
        meta: CountryMetadata,
        catalog: IndicatorCatalog,
        years: YearRange,
    ) -> Self {
        Self {
            panel,
            meta,
            catalog,
            years,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn meta(&self) -> &CountryMetadata {
        &self.meta
    }

    pub fn catalog(&self) -> &IndicatorCatalog {
        &self.catalog
    }

    pub fn years(&self) -> YearRange {
        self.years
    }
}
