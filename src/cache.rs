//! Process-wide dataset cache.
//!
//! Each (indicator catalog, year range) pair is loaded at most once per
//! process. Concurrent callers asking for the same cold key wait on a single
//! download; a failed download leaves the key empty so the next caller
//! retries.

use crate::catalog::IndicatorCatalog;
use crate::error::Result;
use crate::loader::WorldDataset;
use crate::models::YearRange;
use crate::source::DataSource;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Identity of a loaded dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub catalog: IndicatorCatalog,
    pub years: YearRange,
}

type Slot = Arc<OnceCell<Arc<WorldDataset>>>;

/// Keyed store of materialized datasets backed by a data source
#[derive(Debug)]
pub struct DatasetCache<S> {
    source: S,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl<S: DataSource> DatasetCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the cached dataset for the key, loading it on first use
    pub async fn get_or_load(
        &self,
        catalog: &IndicatorCatalog,
        years: YearRange,
    ) -> Result<Arc<WorldDataset>> {
        let key = CacheKey {
            catalog: catalog.clone(),
            years,
        };

        // Hold the map lock only long enough to find or create the slot
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key).or_default().clone()
        };

        if let Some(dataset) = slot.get() {
            debug!("Dataset cache hit for {}", years);
            return Ok(dataset.clone());
        }

        let dataset = slot
            .get_or_try_init(|| async {
                debug!("Dataset cache miss for {}, loading", years);
                WorldDataset::load(&self.source, catalog, years)
                    .await
                    .map(Arc::new)
            })
            .await?;

        Ok(dataset.clone())
    }

    /// True when the key holds a loaded dataset
    pub async fn contains(&self, catalog: &IndicatorCatalog, years: YearRange) -> bool {
        let key = CacheKey {
            catalog: catalog.clone(),
            years,
        };
        self.slots
            .lock()
            .await
            .get(&key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of loaded datasets
    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget every loaded dataset
    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::models::{Economy, WideTable};
    use crate::source::InMemorySource;

    fn test_source() -> InMemorySource {
        let mut table = WideTable::new(vec!["YR2000".to_string(), "YR2001".to_string()]);
        table.push_row("FRA", "SP.DYN.LE00.IN", vec![Some(79.0), Some(79.2)]);
        InMemorySource::new(vec![Economy::country("FRA", "France", Some("ECS"))], table)
    }

    fn test_catalog() -> IndicatorCatalog {
        IndicatorCatalog::new([("life_expectancy", "SP.DYN.LE00.IN")]).unwrap()
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = DatasetCache::new(test_source());
        let years = YearRange::new(2000, 2001).unwrap();

        let first = cache.get_or_load(&test_catalog(), years).await.unwrap();
        let second = cache.get_or_load(&test_catalog(), years).await.unwrap();

        assert_eq!(cache.source().fetch_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_load_separately() {
        let cache = DatasetCache::new(test_source());

        cache
            .get_or_load(&test_catalog(), YearRange::new(2000, 2001).unwrap())
            .await
            .unwrap();
        cache
            .get_or_load(&test_catalog(), YearRange::new(2000, 2000).unwrap())
            .await
            .unwrap();

        assert_eq!(cache.source().fetch_count(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = DatasetCache::new(test_source().failing(1));
        let years = YearRange::new(2000, 2001).unwrap();

        let result = cache.get_or_load(&test_catalog(), years).await;
        assert!(matches!(
            result,
            Err(DashboardError::DataSourceUnavailable { .. })
        ));
        assert!(!cache.contains(&test_catalog(), years).await);

        let dataset = cache.get_or_load(&test_catalog(), years).await.unwrap();
        assert_eq!(dataset.panel().height(), 2);
        assert_eq!(cache.source().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_cold_requests_fetch_once() {
        let cache = DatasetCache::new(test_source());
        let years = YearRange::new(2000, 2001).unwrap();
        let catalog = test_catalog();

        let (a, b) = tokio::join!(
            cache.get_or_load(&catalog, years),
            cache.get_or_load(&catalog, years)
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.source().fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = DatasetCache::new(test_source());
        let years = YearRange::new(2000, 2001).unwrap();

        cache.get_or_load(&test_catalog(), years).await.unwrap();
        cache.clear().await;
        assert!(cache.is_empty().await);

        cache.get_or_load(&test_catalog(), years).await.unwrap();
        assert_eq!(cache.source().fetch_count(), 2);
    }
}
