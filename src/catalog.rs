//! Indicator catalog and region lookup tables.
//!
//! The catalog maps the internal indicator keys used as panel columns to the
//! World Bank series codes they are fetched by. Region tables translate the
//! World Bank region codes into display names and chart colors.

use crate::error::{DashboardError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Column Names and Units
// =============================================================================

/// Country identifier column of the panel
pub const COUNTRY_COLUMN: &str = "country_code";

/// Integer year column of the panel
pub const YEAR_COLUMN: &str = "year";

/// Columns contributed by the country metadata join
pub const META_ID_COLUMN: &str = "id";
pub const META_NAME_COLUMN: &str = "name";
pub const META_REGION_COLUMN: &str = "region";

/// Resolved display region added by the snapshot builder
pub const REGION_NAME_COLUMN: &str = "region_name";

/// Fallback display region for unknown or missing region codes
pub const OTHER_REGION: &str = "Other";

/// Column names an indicator key may not take
pub const RESERVED_COLUMNS: &[&str] = &[
    COUNTRY_COLUMN,
    YEAR_COLUMN,
    META_ID_COLUMN,
    META_NAME_COLUMN,
    META_REGION_COLUMN,
    REGION_NAME_COLUMN,
];

/// 1 kg of oil equivalent expressed in kWh
pub const KGOE_TO_KWH: f64 = 11.63;

// =============================================================================
// Indicator Keys
// =============================================================================

pub mod indicators {
    pub const GDP_PER_CAPITA: &str = "gdp_per_capita_const";
    pub const LIFE_EXPECTANCY: &str = "life_expectancy";
    /// Converted to kWh per capita at load time
    pub const ENERGY_USE_PER_CAPITA: &str = "energy_use_per_capita";
    pub const CO2_PER_CAPITA: &str = "co2_per_capita";
    pub const RENEWABLE_SHARE_NOHYDRO: &str = "renewable_electricity_share_nohydro";
    pub const NUCLEAR_SHARE: &str = "nuclear_electricity_share";
}

/// Canonical catalog entries (key, World Bank series code)
pub const DEFAULT_INDICATORS: &[(&str, &str)] = &[
    (indicators::GDP_PER_CAPITA, "NY.GDP.PCAP.KD"),
    (indicators::LIFE_EXPECTANCY, "SP.DYN.LE00.IN"),
    (indicators::ENERGY_USE_PER_CAPITA, "EG.USE.PCAP.KG.OE"),
    (indicators::CO2_PER_CAPITA, "EN.GHG.CO2.PC.CE.AR5"),
    (indicators::RENEWABLE_SHARE_NOHYDRO, "EG.ELC.RNWX.ZS"),
    (indicators::NUCLEAR_SHARE, "EG.ELC.NUCL.ZS"),
];

/// World Bank region code to display name
pub const REGION_NAMES: &[(&str, &str)] = &[
    ("SSF", "Sub-Saharan Africa"),
    ("ECS", "Europe & Central Asia"),
    ("EAS", "East Asia & Pacific"),
    ("LCN", "Latin America & Caribbean"),
    ("MEA", "Middle East & North Africa"),
    ("NAC", "North America"),
    ("SAS", "South Asia"),
];

/// Display region to chart color
pub const REGION_PALETTE: &[(&str, &str)] = &[
    ("Sub-Saharan Africa", "black"),
    ("Europe & Central Asia", "blue"),
    ("East Asia & Pacific", "green"),
    ("Latin America & Caribbean", "orange"),
    ("Middle East & North Africa", "purple"),
    ("North America", "red"),
    ("South Asia", "brown"),
    (OTHER_REGION, "gray"),
];

// =============================================================================
// Indicator Catalog
// =============================================================================

/// Mapping from indicator key to external series code
///
/// Keys become panel columns; codes are what the data source is queried
/// with. Both sides are unique so the mapping can be inverted when
/// relabeling fetched series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct IndicatorCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for IndicatorCatalog {
    fn default() -> Self {
        Self {
            entries: DEFAULT_INDICATORS
                .iter()
                .map(|(key, code)| (key.to_string(), code.to_string()))
                .collect(),
        }
    }
}

impl IndicatorCatalog {
    /// Build a catalog from (key, code) pairs, validating uniqueness
    pub fn new<K, C>(entries: impl IntoIterator<Item = (K, C)>) -> Result<Self>
    where
        K: Into<String>,
        C: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, code) in entries {
            let key = key.into();
            if map.insert(key.clone(), code.into()).is_some() {
                return Err(DashboardError::configuration(format!(
                    "Indicator key '{}' listed twice",
                    key
                )));
            }
        }

        let catalog = Self { entries: map };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that codes are unique and keys do not shadow panel columns
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (key, code) in &self.entries {
            if key.trim().is_empty() || code.trim().is_empty() {
                return Err(DashboardError::configuration(
                    "Indicator keys and codes cannot be empty",
                ));
            }
            if RESERVED_COLUMNS.contains(&key.as_str()) {
                return Err(DashboardError::configuration(format!(
                    "Indicator key '{}' collides with a reserved panel column",
                    key
                )));
            }
            if let Some(other) = seen.insert(code.as_str(), key.as_str()) {
                return Err(DashboardError::configuration(format!(
                    "Series code '{}' is mapped by both '{}' and '{}'",
                    code, other, key
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indicator keys in column order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Series codes in key order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn code_for(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Inverse mapping used to relabel fetched series
    pub fn code_to_key(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|(k, v)| (v.as_str(), k.as_str()))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, String>> for IndicatorCatalog {
    type Error = DashboardError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self> {
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }
}

impl From<IndicatorCatalog> for BTreeMap<String, String> {
    fn from(catalog: IndicatorCatalog) -> Self {
        catalog.entries
    }
}

// =============================================================================
// Region Names
// =============================================================================

/// Region code to display name lookup with an "Other" fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNames {
    names: BTreeMap<String, String>,
}

impl Default for RegionNames {
    fn default() -> Self {
        Self::new(REGION_NAMES.iter().copied())
    }
}

impl RegionNames {
    pub fn new<C, N>(entries: impl IntoIterator<Item = (C, N)>) -> Self
    where
        C: Into<String>,
        N: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        }
    }

    /// Resolve a region code, falling back to "Other"
    pub fn resolve(&self, code: Option<&str>) -> &str {
        code.and_then(|c| self.names.get(c))
            .map(String::as_str)
            .unwrap_or(OTHER_REGION)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Polars expression mapping the `region` column to a display name
    ///
    /// Null and unmapped codes both fall through to "Other".
    pub fn expr(&self, region_column: &str) -> Expr {
        self.names
            .iter()
            .fold(lit(OTHER_REGION), |otherwise, (code, name)| {
                when(col(region_column).eq(lit(code.as_str())))
                    .then(lit(name.as_str()))
                    .otherwise(otherwise)
            })
    }
}

/// Chart color name for a display region, gray for anything unknown
pub fn region_color(region_name: &str) -> &'static str {
    REGION_PALETTE
        .iter()
        .find(|(name, _)| *name == region_name)
        .map(|(_, color)| *color)
        .unwrap_or("gray")
}
