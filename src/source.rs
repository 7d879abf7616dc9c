//! Statistical data sources.
//!
//! The loader only needs two capabilities from the outside world: the list
//! of economies with their region and aggregate flag, and indicator values
//! in the wide (economy × series by year) shape. `WorldBankClient` provides
//! them over the World Bank Indicators API v2; `InMemorySource` serves fixed
//! data for tests and offline runs.

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::models::{Economy, WideTable, YearRange};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prefix the wide shape puts in front of every year label
pub const YEAR_LABEL_PREFIX: &str = "YR";

/// Region value the World Bank uses to mark aggregate economies
const AGGREGATE_REGION: &str = "Aggregates";

/// Provider of country metadata and indicator observations
pub trait DataSource: Send + Sync {
    /// All economies known to the source, aggregates included
    fn economies(&self) -> impl Future<Output = Result<Vec<Economy>>> + Send;

    /// Observations for `codes` over `years`, one row per (economy, series)
    fn indicator_table(
        &self,
        codes: &[String],
        years: YearRange,
    ) -> impl Future<Output = Result<WideTable>> + Send;
}

/// Year labels in source format for a range
pub fn year_labels(years: YearRange) -> Vec<String> {
    years
        .years()
        .map(|year| format!("{}{}", YEAR_LABEL_PREFIX, year))
        .collect()
}

// =============================================================================
// World Bank API
// =============================================================================

/// Page header element of every World Bank API response
#[derive(Debug, Deserialize)]
struct PageHeader {
    #[serde(deserialize_with = "number_or_string")]
    page: u32,
    #[serde(deserialize_with = "number_or_string")]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct IdValue {
    id: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    id: String,
    name: String,
    region: IdValue,
}

#[derive(Debug, Deserialize)]
struct IndicatorRecord {
    indicator: IdValue,
    country: IdValue,
    #[serde(default)]
    countryiso3code: String,
    date: String,
    value: Option<f64>,
}

/// The API is inconsistent about quoting its paging numbers
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| D::Error::custom(format!("invalid page number {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid page number '{}'", s))),
        other => Err(D::Error::custom(format!("invalid page number {}", other))),
    }
}

/// Blocking HTTP client for the World Bank Indicators API
#[derive(Debug, Clone)]
pub struct WorldBankClient {
    agent: ureq::Agent,
    base_url: String,
    per_page: usize,
    max_concurrent_requests: usize,
}

impl WorldBankClient {
    /// Create a client against `base_url` (e.g. "https://api.worldbank.org/v2")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(&DashboardConfig::default()).with_base_url(base_url)
    }

    /// Create a client using the paging, timeout and concurrency settings of `config`
    pub fn from_config(config: &DashboardConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build();

        Self {
            agent,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one GET on a worker thread and return the decoded JSON body
    async fn get_json(&self, path: String, query: Vec<(&'static str, String)>) -> Result<Value> {
        let agent = self.agent.clone();
        let url = format!("{}/{}", self.base_url, path);

        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&url).query("format", "json");
            for (key, value) in &query {
                request = request.query(key, value);
            }

            debug!("GET {} {:?}", url, query);
            let response = request.call().map_err(|e| {
                DashboardError::unavailable(format!("Request to {} failed: {}", url, e))
            })?;

            response.into_json::<Value>().map_err(|e| {
                DashboardError::unavailable_with(format!("Unreadable response from {}", url), e)
            })
        })
        .await
        .map_err(|e| DashboardError::unavailable_with("HTTP worker task failed", e))?
    }

    /// Fetch every page of a paged endpoint
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: String,
        query: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let mut page_query = query.clone();
            page_query.push(("per_page", self.per_page.to_string()));
            page_query.push(("page", page.to_string()));

            let body = self.get_json(path.clone(), page_query).await?;
            let (header, page_records) = split_page::<T>(body)?;
            records.extend(page_records);

            if header.page >= header.pages {
                break;
            }
            page = header.page + 1;
        }

        Ok(records)
    }

    /// Fetch one indicator over all economies into the wide shape
    async fn fetch_indicator(&self, code: String, years: YearRange) -> Result<WideTable> {
        let records: Vec<IndicatorRecord> = self
            .get_all_pages(
                format!("country/all/indicator/{}", code),
                vec![("date", format!("{}:{}", years.start, years.end))],
            )
            .await?;

        debug!("Fetched {} records for {}", records.len(), code);
        records_to_wide(records, years)
    }
}

/// Split a `[header, records]` response, surfacing API error payloads
fn split_page<T: DeserializeOwned>(body: Value) -> Result<(PageHeader, Vec<T>)> {
    let Value::Array(mut parts) = body else {
        return Err(DashboardError::malformed("Expected a JSON array response"));
    };

    if let Some(messages) = parts.first().and_then(|head| head.get("message")) {
        return Err(DashboardError::unavailable(format!(
            "World Bank API rejected the request: {}",
            messages
        )));
    }

    if parts.is_empty() {
        return Err(DashboardError::malformed("Empty JSON array response"));
    }

    let records = if parts.len() > 1 {
        parts.swap_remove(1)
    } else {
        Value::Null
    };
    let header: PageHeader = serde_json::from_value(parts.swap_remove(0))?;

    let records = match records {
        Value::Null => Vec::new(),
        other => serde_json::from_value(other)?,
    };

    Ok((header, records))
}

/// Arrange long API records into one wide row per (economy, series)
///
/// A second record for the same (economy, series, year) is a
/// `DuplicateObservation`, whether or not its value matches the first.
fn records_to_wide(records: Vec<IndicatorRecord>, years: YearRange) -> Result<WideTable> {
    let labels = year_labels(years);
    let mut rows: BTreeMap<(String, String), Vec<Cell>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let year_index = record
            .date
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|year| years.contains(*year))
            .map(|year| (year, (year - years.start) as usize));

        let Some((year, index)) = year_index else {
            skipped += 1;
            continue;
        };

        let economy = if record.countryiso3code.trim().is_empty() {
            record.country.id
        } else {
            record.countryiso3code
        };

        let cells = rows
            .entry((economy.clone(), record.indicator.id.clone()))
            .or_insert_with(|| vec![Cell::Unseen; labels.len()]);
        if cells[index] != Cell::Unseen {
            return Err(DashboardError::DuplicateObservation {
                country: economy,
                year,
                indicator: record.indicator.id,
            });
        }
        cells[index] = Cell::Reported(record.value);
    }

    if skipped > 0 {
        warn!("Skipped {} records with dates outside {}", skipped, years);
    }

    let mut table = WideTable::new(labels);
    for ((economy, series), cells) in rows {
        table.push_row(economy, series, cells.into_iter().map(Cell::value).collect());
    }
    Ok(table)
}

/// A year slot of one (economy, series) row; null records still occupy it
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Unseen,
    Reported(Option<f64>),
}

impl Cell {
    fn value(self) -> Option<f64> {
        match self {
            Cell::Unseen => None,
            Cell::Reported(value) => value,
        }
    }
}

/// Economy for one country record; the "Aggregates" region marks aggregates
fn economy_from_record(record: CountryRecord) -> Economy {
    let aggregate = record.region.value.trim() == AGGREGATE_REGION;
    let region = Some(record.region.id.trim().to_string()).filter(|r| !r.is_empty());
    Economy {
        id: record.id,
        name: record.name,
        region: if aggregate { None } else { region },
        aggregate,
    }
}

impl DataSource for WorldBankClient {
    async fn economies(&self) -> Result<Vec<Economy>> {
        let records: Vec<CountryRecord> = self.get_all_pages("country".to_string(), vec![]).await?;
        let economies: Vec<Economy> = records.into_iter().map(economy_from_record).collect();

        info!(
            "Fetched {} economies ({} aggregates)",
            economies.len(),
            economies.iter().filter(|e| e.aggregate).count()
        );
        Ok(economies)
    }

    async fn indicator_table(&self, codes: &[String], years: YearRange) -> Result<WideTable> {
        let tables: Vec<WideTable> = stream::iter(codes.iter().cloned())
            .map(|code| self.fetch_indicator(code, years))
            .buffer_unordered(self.max_concurrent_requests)
            .try_collect()
            .await?;

        let mut combined = WideTable::new(year_labels(years));
        for table in tables {
            combined.extend(table)?;
        }

        info!(
            "Fetched {} series rows for {} indicators over {}",
            combined.rows.len(),
            codes.len(),
            years
        );
        Ok(combined)
    }
}

// =============================================================================
// In-Memory Source
// =============================================================================

/// Fixed economies and wide observations served from memory
///
/// Counts fetches so callers can verify memoization, and can be told to
/// fail a number of times before succeeding.
#[derive(Debug, Default)]
pub struct InMemorySource {
    economies: Vec<Economy>,
    table: WideTable,
    fetches: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl InMemorySource {
    pub fn new(economies: Vec<Economy>, table: WideTable) -> Self {
        Self {
            economies,
            table,
            fetches: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// Fail the next `failures` indicator fetches with `DataSourceUnavailable`
    pub fn failing(self, failures: usize) -> Self {
        self.failures_remaining.store(failures, Ordering::SeqCst);
        self
    }

    /// Number of indicator fetches served so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataSource for InMemorySource {
    async fn economies(&self) -> Result<Vec<Economy>> {
        Ok(self.economies.clone())
    }

    /// Rows for `codes`, keeping only the year columns inside `years`
    async fn indicator_table(&self, codes: &[String], years: YearRange) -> Result<WideTable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DashboardError::unavailable("In-memory source set to fail"));
        }

        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
        let requested: HashSet<String> = year_labels(years).into_iter().collect();
        let columns: Vec<usize> = self
            .table
            .year_labels
            .iter()
            .enumerate()
            .filter(|(_, label)| requested.contains(label.trim()))
            .map(|(i, _)| i)
            .collect();

        let mut table = WideTable::new(
            columns
                .iter()
                .map(|i| self.table.year_labels[*i].clone())
                .collect(),
        );
        for row in self
            .table
            .rows
            .iter()
            .filter(|row| wanted.contains(row.series.as_str()))
        {
            let values = columns
                .iter()
                .map(|i| row.values.get(*i).copied().flatten())
                .collect();
            table.push_row(row.economy.clone(), row.series.clone(), values);
        }
        Ok(table)
    }
}
