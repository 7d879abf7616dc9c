//! Integration tests for the dataset pipeline
//!
//! These tests drive the public API end to end with an in-memory source:
//! loading through the cache, snapshots, fits, the dashboard pages and
//! exporting their tables.

use std::sync::Arc;
use tempfile::TempDir;
use world_dashboard::catalog::{COUNTRY_COLUMN, KGOE_TO_KWH, REGION_NAME_COLUMN, indicators};
use world_dashboard::config::CompressionAlgorithm;
use world_dashboard::export::{read_frame, write_frame};
use world_dashboard::views::{
    EmissionsView, EnergyThresholdView, LifeExpectancyView, LowCarbonRequest, LowCarbonView,
    ScatterRequest, ThresholdRequest,
};
use world_dashboard::{
    DashboardError, DatasetCache, Economy, FitKind, InMemorySource, IndicatorCatalog, LinearFit,
    PowerLawFit, WideTable, WorldDataset, YearRange,
};

const YEARS: [i32; 3] = [2000, 2010, 2020];

fn economies() -> Vec<Economy> {
    vec![
        Economy::country("FRA", "France", Some("ECS")),
        Economy::country("NOR", "Norway", Some("ECS")),
        Economy::country("KEN", "Kenya", Some("SSF")),
        Economy::country("BRA", "Brazil", Some("LCN")),
        Economy::country("USA", "United States", Some("NAC")),
        Economy::country("XKX", "Kosovo", None),
        Economy::aggregate("WLD", "World"),
        Economy::aggregate("EUU", "European Union"),
    ]
}

/// World Bank shaped table: one row per (economy, series), "YR" year labels
fn wide_table() -> WideTable {
    let mut table = WideTable::new(YEARS.iter().map(|y| format!("YR{}", y)).collect());

    // Energy use in kg of oil equivalent per capita
    table.push_row("FRA", "EG.USE.PCAP.KG.OE", vec![Some(4_200.0), Some(3_900.0), Some(3_300.0)]);
    table.push_row("NOR", "EG.USE.PCAP.KG.OE", vec![Some(5_800.0), Some(6_500.0), Some(5_400.0)]);
    table.push_row("KEN", "EG.USE.PCAP.KG.OE", vec![Some(460.0), Some(480.0), Some(510.0)]);
    table.push_row("BRA", "EG.USE.PCAP.KG.OE", vec![Some(1_070.0), Some(1_370.0), Some(1_400.0)]);
    table.push_row("USA", "EG.USE.PCAP.KG.OE", vec![Some(8_050.0), Some(7_160.0), Some(6_400.0)]);
    table.push_row("XKX", "EG.USE.PCAP.KG.OE", vec![None, Some(1_300.0), Some(1_350.0)]);
    table.push_row("WLD", "EG.USE.PCAP.KG.OE", vec![Some(1_650.0), Some(1_850.0), Some(1_800.0)]);

    table.push_row("FRA", "SP.DYN.LE00.IN", vec![Some(79.1), Some(81.7), Some(82.2)]);
    table.push_row("NOR", "SP.DYN.LE00.IN", vec![Some(78.7), Some(81.0), Some(83.2)]);
    table.push_row("KEN", "SP.DYN.LE00.IN", vec![Some(51.0), Some(58.9), Some(61.4)]);
    table.push_row("BRA", "SP.DYN.LE00.IN", vec![Some(70.1), Some(73.6), Some(74.0)]);
    table.push_row("USA", "SP.DYN.LE00.IN", vec![Some(76.6), Some(78.5), Some(77.0)]);
    table.push_row("XKX", "SP.DYN.LE00.IN", vec![None, Some(70.2), Some(76.6)]);
    table.push_row("EUU", "SP.DYN.LE00.IN", vec![Some(77.3), Some(79.6), Some(80.4)]);

    table.push_row("FRA", "EN.GHG.CO2.PC.CE.AR5", vec![Some(6.0), Some(5.5), Some(4.2)]);
    table.push_row("NOR", "EN.GHG.CO2.PC.CE.AR5", vec![Some(8.1), Some(8.5), Some(7.0)]);
    table.push_row("KEN", "EN.GHG.CO2.PC.CE.AR5", vec![Some(0.3), Some(0.3), Some(0.4)]);
    table.push_row("BRA", "EN.GHG.CO2.PC.CE.AR5", vec![Some(1.9), Some(2.2), Some(2.1)]);
    table.push_row("USA", "EN.GHG.CO2.PC.CE.AR5", vec![Some(20.5), Some(17.4), Some(13.0)]);

    table.push_row("FRA", "EG.ELC.NUCL.ZS", vec![Some(77.0), Some(75.0), Some(67.0)]);
    table.push_row("NOR", "EG.ELC.NUCL.ZS", vec![Some(0.0), Some(0.0), Some(0.0)]);
    table.push_row("KEN", "EG.ELC.NUCL.ZS", vec![Some(0.0), Some(0.0), Some(0.0)]);
    table.push_row("BRA", "EG.ELC.NUCL.ZS", vec![Some(1.0), Some(2.7), Some(2.2)]);
    table.push_row("USA", "EG.ELC.NUCL.ZS", vec![Some(20.0), Some(19.3), Some(19.7)]);

    table.push_row("FRA", "EG.ELC.RNWX.ZS", vec![Some(0.8), Some(3.8), Some(10.5)]);
    table.push_row("NOR", "EG.ELC.RNWX.ZS", vec![Some(0.2), Some(0.8), Some(6.5)]);
    table.push_row("KEN", "EG.ELC.RNWX.ZS", vec![Some(7.5), Some(17.0), Some(46.0)]);
    table.push_row("BRA", "EG.ELC.RNWX.ZS", vec![Some(3.0), Some(6.9), Some(20.5)]);
    table.push_row("USA", "EG.ELC.RNWX.ZS", vec![Some(2.1), Some(4.1), Some(12.8)]);

    table
}

fn source() -> InMemorySource {
    InMemorySource::new(economies(), wide_table())
}

fn years() -> YearRange {
    YearRange::new(2000, 2020).unwrap()
}

async fn load() -> WorldDataset {
    WorldDataset::load(&source(), &IndicatorCatalog::default(), years())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_panel_excludes_aggregates() {
    let dataset = load().await;
    let panel = dataset.panel();

    let ids = panel.country_ids().unwrap();
    assert_eq!(ids, vec!["BRA", "FRA", "KEN", "NOR", "USA", "XKX"]);
    for id in &ids {
        assert!(dataset.meta().contains(id));
    }
    assert!(!dataset.meta().contains("WLD"));
    assert!(!dataset.meta().contains("EUU"));
}

#[tokio::test]
async fn test_panel_shape_and_years() {
    let dataset = load().await;
    let panel = dataset.panel();

    // Six countries in three years, except Kosovo without 2000 data
    assert_eq!(panel.height(), 17);
    assert_eq!(panel.years().unwrap(), YEARS.to_vec());
    assert_eq!(panel.frame().width(), 2 + IndicatorCatalog::default().len());

    // GDP was never reported but keeps its column
    assert!(panel.has_column(indicators::GDP_PER_CAPITA));
    assert_eq!(panel.value("FRA", 2010, indicators::GDP_PER_CAPITA).unwrap(), None);
}

#[tokio::test]
async fn test_panel_limited_to_requested_years() {
    let narrow = YearRange::new(2005, 2015).unwrap();
    let dataset = WorldDataset::load(&source(), &IndicatorCatalog::default(), narrow)
        .await
        .unwrap();

    assert_eq!(dataset.panel().years().unwrap(), vec![2010]);
    assert_eq!(dataset.panel().height(), 6);
}

#[tokio::test]
async fn test_energy_converted_once() {
    let dataset = load().await;

    let france = dataset
        .panel()
        .value("FRA", 2000, indicators::ENERGY_USE_PER_CAPITA)
        .unwrap()
        .unwrap();
    assert!((france - 4_200.0 * KGOE_TO_KWH).abs() < 1e-6);

    // Snapshots read the converted column as is
    let snapshot = dataset
        .snapshot(2000, &[indicators::ENERGY_USE_PER_CAPITA])
        .unwrap();
    let max = snapshot.max(indicators::ENERGY_USE_PER_CAPITA).unwrap().unwrap();
    assert!((max - 8_050.0 * KGOE_TO_KWH).abs() < 1e-6);
}

#[tokio::test]
async fn test_loading_twice_gives_identical_panels() {
    let first = load().await;
    let second = load().await;
    assert!(first.panel().frame().equals_missing(second.panel().frame()));
}

#[tokio::test]
async fn test_cache_loads_once_per_key() {
    let cache = DatasetCache::new(source());
    let catalog = IndicatorCatalog::default();

    let (a, b) = tokio::join!(
        cache.get_or_load(&catalog, years()),
        cache.get_or_load(&catalog, years())
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.source().fetch_count(), 1);

    let narrow = IndicatorCatalog::new([(indicators::LIFE_EXPECTANCY, "SP.DYN.LE00.IN")]).unwrap();
    let other = cache.get_or_load(&narrow, years()).await.unwrap();
    assert_eq!(other.panel().indicators(), [indicators::LIFE_EXPECTANCY]);
    assert_eq!(cache.source().fetch_count(), 2);
}

#[tokio::test]
async fn test_cache_retries_after_failure() {
    let cache = DatasetCache::new(source().failing(1));
    let catalog = IndicatorCatalog::default();

    assert!(matches!(
        cache.get_or_load(&catalog, years()).await,
        Err(DashboardError::DataSourceUnavailable { .. })
    ));
    assert!(cache.get_or_load(&catalog, years()).await.is_ok());
}

#[tokio::test]
async fn test_full_snapshot_regions() {
    let dataset = load().await;
    let snapshot = dataset
        .full_snapshot(
            2020,
            &[indicators::ENERGY_USE_PER_CAPITA, indicators::LIFE_EXPECTANCY],
        )
        .unwrap();

    assert_eq!(snapshot.height(), 6);
    let regions = snapshot.strings(REGION_NAME_COLUMN).unwrap();
    assert!(regions.iter().all(Option::is_some));

    let ids = snapshot.strings(COUNTRY_COLUMN).unwrap();
    let kosovo = ids.iter().position(|id| id.as_deref() == Some("XKX")).unwrap();
    assert_eq!(regions[kosovo].as_deref(), Some("Other"));

    let partial = dataset
        .full_snapshot(2020, &[indicators::CO2_PER_CAPITA])
        .unwrap();
    assert!(partial.height() <= snapshot.height());
    assert_eq!(partial.height(), 5);
}

#[tokio::test]
async fn test_fits_on_snapshot_columns() {
    let dataset = load().await;
    let snapshot = dataset
        .snapshot(
            2010,
            &[indicators::ENERGY_USE_PER_CAPITA, indicators::CO2_PER_CAPITA],
        )
        .unwrap();

    let (x, y) = snapshot
        .pairs(indicators::ENERGY_USE_PER_CAPITA, indicators::CO2_PER_CAPITA)
        .unwrap();
    assert_eq!(x.len(), 5);

    let linear = LinearFit::fit(&x, &y).unwrap();
    assert!(linear.slope > 0.0);
    assert!(linear.r2 > 0.5 && linear.r2 <= 1.0);

    let power = PowerLawFit::fit(&x, &y).unwrap();
    assert!(power.alpha > 0.0);
    assert_eq!(power.points, 5);
}

#[tokio::test]
async fn test_dashboard_pages() {
    let dataset = load().await;

    let life = LifeExpectancyView::build(&dataset, &ScatterRequest::new(2020).with_fit(true)).unwrap();
    assert_eq!(life.points.len(), 6);
    assert_eq!(life.fit.map(|fit| fit.kind()), Some(FitKind::PowerLaw));

    let europe = EmissionsView::build(
        &dataset,
        &ScatterRequest::new(2020)
            .with_regions(vec!["Europe & Central Asia".to_string()])
            .with_fit(true),
    )
    .unwrap();
    assert_eq!(europe.points.len(), 2);
    assert_eq!(europe.curve.map(|curve| curve.len()), Some(200));

    let threshold =
        EnergyThresholdView::build(&dataset, &ThresholdRequest::new(2020, 76.0)).unwrap();
    assert_eq!(threshold.best_countries, vec!["Kosovo"]);
    assert_eq!(threshold.eligible_count(), 4);

    let low_carbon =
        LowCarbonView::build(&dataset, &LowCarbonRequest::new(2020).with_top(2)).unwrap();
    let names: Vec<&str> = low_carbon.rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["France", "Kenya"]);
}

#[tokio::test]
async fn test_pages_without_their_indicators() {
    let catalog = IndicatorCatalog::new([(indicators::LIFE_EXPECTANCY, "SP.DYN.LE00.IN")]).unwrap();
    let dataset = WorldDataset::load(&source(), &catalog, years()).await.unwrap();

    let error = LifeExpectancyView::build(&dataset, &ScatterRequest::new(2020)).unwrap_err();
    match error {
        DashboardError::MissingColumn { column } => {
            assert_eq!(column, indicators::ENERGY_USE_PER_CAPITA)
        }
        other => panic!("expected missing column, got {:?}", other),
    }
}

#[tokio::test]
async fn test_export_page_tables() {
    let dataset = load().await;
    let dir = TempDir::new().unwrap();

    let view = LowCarbonView::build(&dataset, &LowCarbonRequest::new(2010)).unwrap();
    let path = dir.path().join("low_carbon.parquet");
    let rows = write_frame(&mut view.to_frame().unwrap(), &path, CompressionAlgorithm::Snappy).unwrap();
    assert_eq!(rows, 5);
    assert_eq!(read_frame(&path).unwrap().height(), 5);

    let snapshot = dataset.full_snapshot(2020, &[indicators::CO2_PER_CAPITA]).unwrap();
    let path = dir.path().join("snapshot.csv");
    write_frame(&mut snapshot.into_frame(), &path, CompressionAlgorithm::Snappy).unwrap();
    let back = read_frame(&path).unwrap();
    assert_eq!(back.height(), 5);
    assert!(back.column(REGION_NAME_COLUMN).is_ok());
}
