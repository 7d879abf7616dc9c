//! Writing view tables and snapshots to disk.
//!
//! The format follows the file extension: `.csv` or `.parquet`. Parquet
//! output uses the configured compression.

use crate::config::CompressionAlgorithm;
use crate::error::{DashboardError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// On-disk table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    /// Pick the format from the path's extension, case-insensitively
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") | Some("pq") => Ok(Self::Parquet),
            _ => Err(DashboardError::InvalidInput {
                message: format!(
                    "Cannot export to {}: expected a .csv or .parquet file",
                    path.display()
                ),
            }),
        }
    }
}

/// Write `frame` to `path`, returning the number of rows written
pub fn write_frame(
    frame: &mut DataFrame,
    path: &Path,
    compression: CompressionAlgorithm,
) -> Result<usize> {
    let format = ExportFormat::from_path(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    match format {
        ExportFormat::Csv => {
            CsvWriter::new(&mut file).include_header(true).finish(frame)?;
        }
        ExportFormat::Parquet => {
            ParquetWriter::new(file)
                .with_compression(compression.to_polars_compression())
                .with_statistics(StatisticsOptions::default())
                .finish(frame)?;
        }
    }

    info!(
        "Exported {} rows to {} ({:?})",
        frame.height(),
        path.display(),
        format
    );
    Ok(frame.height())
}

/// Read back a table written by `write_frame`
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let frame = match ExportFormat::from_path(path)? {
        ExportFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        ExportFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
    };
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("country_code".into(), vec!["FRA", "KEN"]),
            Column::new("year".into(), vec![2020i32, 2020]),
            Column::new("life_expectancy".into(), vec![Some(82.0), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/table.CSV")).unwrap(),
            ExportFormat::Csv
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("table.parquet")).unwrap(),
            ExportFormat::Parquet
        );
        assert!(ExportFormat::from_path(Path::new("table.xlsx")).is_err());
        assert!(ExportFormat::from_path(Path::new("table")).is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("snapshot.csv");

        let rows = write_frame(&mut test_frame(), &path, CompressionAlgorithm::Snappy).unwrap();
        assert_eq!(rows, 2);

        let back = read_frame(&path).unwrap();
        assert_eq!(back.height(), 2);
        assert_eq!(back.width(), 3);
        assert_eq!(back.column("life_expectancy").unwrap().null_count(), 1);
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.parquet");

        write_frame(&mut test_frame(), &path, CompressionAlgorithm::Zstd).unwrap();

        let back = read_frame(&path).unwrap();
        assert!(back.equals_missing(&test_frame()));
    }

    #[test]
    fn test_unknown_extension_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.txt");

        assert!(write_frame(&mut test_frame(), &path, CompressionAlgorithm::Snappy).is_err());
        assert!(!path.exists());
    }
}
