//! Core data structures shared by the source, loader and snapshot layers.
//!
//! Defines the year range a panel covers, country metadata rows, and the
//! raw wide/long observation shapes the loader reshapes between.

use crate::catalog::{META_ID_COLUMN, META_NAME_COLUMN, META_REGION_COLUMN};
use crate::error::{DashboardError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// =============================================================================
// Year Range
// =============================================================================

/// Inclusive range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Create a range, rejecting start > end
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(DashboardError::configuration(format!(
                "Year range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2000,
            end: 2022,
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// =============================================================================
// Country Metadata
// =============================================================================

/// One economy as reported by the data source, aggregates included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Economy {
    pub id: String,
    pub name: String,
    /// World Bank region code (e.g. "SSF")
    pub region: Option<String>,
    /// Region, income band or other grouping rather than a country
    pub aggregate: bool,
}

impl Economy {
    pub fn country(id: &str, name: &str, region: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region: region.map(str::to_string),
            aggregate: false,
        }
    }

    pub fn aggregate(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region: None,
            aggregate: true,
        }
    }
}

/// A real country: id, region code and display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub region: Option<String>,
    pub name: String,
}

/// Metadata for non-aggregate economies, indexed by id
#[derive(Debug, Clone)]
pub struct CountryMetadata {
    countries: Vec<Country>,
    ids: HashSet<String>,
    frame: DataFrame,
}

impl CountryMetadata {
    /// Keep only non-aggregate economies
    ///
    /// The first row wins if the source lists an id twice.
    pub fn from_economies(economies: impl IntoIterator<Item = Economy>) -> Result<Self> {
        let mut ids = HashSet::new();
        let countries: Vec<Country> = economies
            .into_iter()
            .filter(|economy| !economy.aggregate)
            .filter(|economy| ids.insert(economy.id.clone()))
            .map(|economy| Country {
                id: economy.id,
                region: economy.region,
                name: economy.name,
            })
            .collect();

        let frame = DataFrame::new(vec![
            Column::new(
                META_ID_COLUMN.into(),
                countries.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                META_REGION_COLUMN.into(),
                countries
                    .iter()
                    .map(|c| c.region.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                META_NAME_COLUMN.into(),
                countries.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            ),
        ])?;

        Ok(Self {
            countries,
            ids,
            frame,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.id == id)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Columns `id`, `region`, `name`
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }
}

// =============================================================================
// Raw Observation Shapes
// =============================================================================

/// Indicator data as the source delivers it
///
/// One row per (economy, series code), one value per year label. Labels are
/// source formatted, e.g. "YR2010".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub year_labels: Vec<String>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub economy: String,
    pub series: String,
    /// Aligned with `WideTable::year_labels`
    pub values: Vec<Option<f64>>,
}

impl WideTable {
    pub fn new(year_labels: Vec<String>) -> Self {
        Self {
            year_labels,
            rows: Vec::new(),
        }
    }

    pub fn push_row(
        &mut self,
        economy: impl Into<String>,
        series: impl Into<String>,
        values: Vec<Option<f64>>,
    ) {
        self.rows.push(WideRow {
            economy: economy.into(),
            series: series.into(),
            values,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append another table with identical year labels
    pub fn extend(&mut self, other: WideTable) -> Result<()> {
        if self.year_labels.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.rows.is_empty() {
            return Ok(());
        }
        if self.year_labels != other.year_labels {
            return Err(DashboardError::malformed(format!(
                "Cannot combine tables with different year columns ({} vs {})",
                self.year_labels.len(),
                other.year_labels.len()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }
}

/// One (economy, series, year, value) record of the long shape
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub economy: String,
    pub series: String,
    pub year: i32,
    pub value: Option<f64>,
}
