//! # Export Module
//!
//! Writes CSV tables and the JSON report under one output root. Each write is
//! independent so a failing file never prevents the others.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ExportError;
use crate::models::{DetailedRow, Report, ResourceKind, ResourceUsage, UsageRecord};

pub const DEFAULT_OUTPUT_DIR: &str = "reports";
pub const DEFAULT_FILE_PREFIX: &str = "usage";
pub const RECORDS_FILE_PREFIX: &str = "enhanced";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// Builds the filenames for one run. The period tag keeps different windows
/// apart; the optional generation stamp keeps reruns of one window apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNames {
    pub prefix: String,
    pub tag: String,
    pub stamp: Option<String>,
}

impl FileNames {
    pub fn new(prefix: &str, tag: &str, generated_at: Option<NaiveDateTime>) -> Self {
        FileNames {
            prefix: prefix.to_string(),
            tag: tag.to_string(),
            stamp: generated_at.map(|t| t.format(STAMP_FORMAT).to_string()),
        }
    }

    fn suffix(&self) -> String {
        match &self.stamp {
            Some(stamp) => format!("{}_{}", self.tag, stamp),
            None => self.tag.clone(),
        }
    }

    pub fn series_csv(&self, resource: ResourceKind) -> String {
        format!("{}_{}_usage_{}.csv", self.prefix, resource, self.suffix())
    }

    pub fn combined_csv(&self) -> String {
        format!("{}_combined_usage_{}.csv", self.prefix, self.suffix())
    }

    pub fn detailed_csv(&self) -> String {
        format!("{}_detailed_usage_{}.csv", self.prefix, self.suffix())
    }

    /// `table` is one of user, project, workload, status
    pub fn summary_csv(&self, table: &str) -> String {
        format!("{}_{}_summary_{}.csv", self.prefix, table, self.suffix())
    }

    pub fn report_json(&self, kind: &str) -> String {
        format!("{}_{}_report_{}.json", self.prefix, kind, self.suffix())
    }
}

pub struct Exporter {
    root: PathBuf,
}

impl Exporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Exporter { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, filename: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.root).map_err(|source| ExportError::CreateDir {
            path: self.root.clone(),
            source,
        })?;
        Ok(self.root.join(filename))
    }

    fn csv_writer(&self, path: &Path) -> Result<csv::Writer<File>, ExportError> {
        csv::Writer::from_path(path).map_err(|source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    fn finish(path: &Path, mut wtr: csv::Writer<File>) -> Result<(), ExportError> {
        wtr.flush().map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Two columns: `timestamp` and `<resource>_count`. Empty series are not written.
    pub fn write_series_csv(
        &self,
        usage: &ResourceUsage,
        filename: &str,
    ) -> Result<PathBuf, ExportError> {
        if usage.data_points.is_empty() {
            return Err(ExportError::Empty(filename.to_string()));
        }
        let path = self.target(filename)?;
        let mut wtr = self.csv_writer(&path)?;
        let csv_err = |source| ExportError::Csv {
            path: path.clone(),
            source,
        };
        let count_col = format!("{}_count", usage.series_type);
        wtr.write_record(["timestamp", count_col.as_str()])
            .map_err(csv_err)?;
        for point in &usage.data_points {
            wtr.write_record([point.timestamp_str(), point.count.to_string()])
                .map_err(csv_err)?;
        }
        Self::finish(&path, wtr)?;
        info!(path = %path.display(), rows = usage.data_points.len(), "exported series csv");
        Ok(path)
    }

    /// Pivot of timestamp × resource; cells without a sample are 0
    pub fn write_combined_csv(
        &self,
        series: &[&ResourceUsage],
        filename: &str,
    ) -> Result<PathBuf, ExportError> {
        let mut grid: BTreeMap<NaiveDateTime, BTreeMap<ResourceKind, i64>> = BTreeMap::new();
        for usage in series {
            for point in &usage.data_points {
                grid.entry(point.timestamp)
                    .or_default()
                    .insert(usage.series_type, point.count);
            }
        }
        if grid.is_empty() {
            return Err(ExportError::Empty(filename.to_string()));
        }

        let columns: Vec<ResourceKind> = series.iter().map(|u| u.series_type).collect();
        let path = self.target(filename)?;
        let mut wtr = self.csv_writer(&path)?;
        let csv_err = |source| ExportError::Csv {
            path: path.clone(),
            source,
        };
        let mut header = vec!["timestamp".to_string()];
        header.extend(columns.iter().map(|c| c.to_string()));
        wtr.write_record(&header).map_err(csv_err)?;
        for (ts, cells) in &grid {
            let mut row = vec![ts.format("%Y-%m-%dT%H:%M:%S").to_string()];
            row.extend(
                columns
                    .iter()
                    .map(|c| cells.get(c).copied().unwrap_or(0).to_string()),
            );
            wtr.write_record(&row).map_err(csv_err)?;
        }
        Self::finish(&path, wtr)?;
        info!(path = %path.display(), rows = grid.len(), "exported combined csv");
        Ok(path)
    }

    /// Header row comes from the field names of `T`
    pub fn write_table<T: Serialize>(
        &self,
        rows: &[T],
        filename: &str,
    ) -> Result<PathBuf, ExportError> {
        if rows.is_empty() {
            return Err(ExportError::Empty(filename.to_string()));
        }
        let path = self.target(filename)?;
        let mut wtr = self.csv_writer(&path)?;
        for row in rows {
            wtr.serialize(row).map_err(|source| ExportError::Csv {
                path: path.clone(),
                source,
            })?;
        }
        Self::finish(&path, wtr)?;
        info!(path = %path.display(), rows = rows.len(), "exported table");
        Ok(path)
    }

    pub fn write_detailed_csv(
        &self,
        records: &[UsageRecord],
        filename: &str,
    ) -> Result<PathBuf, ExportError> {
        let rows: Vec<DetailedRow> = records.iter().map(DetailedRow::from).collect();
        self.write_table(&rows, filename)
    }

    pub fn write_json(&self, report: &Report, filename: &str) -> Result<PathBuf, ExportError> {
        let path = self.target(filename)?;
        let file = File::create(&path).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, report).map_err(|source| ExportError::Json {
            path: path.clone(),
            source,
        })?;
        out.flush().map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote json report");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSeriesPoint;
    use crate::normalize::millis_to_naive;
    use tempfile::TempDir;

    fn usage(kind: ResourceKind, samples: &[(i64, i64)]) -> ResourceUsage {
        ResourceUsage {
            success: true,
            series_type: kind,
            data_points: samples
                .iter()
                .map(|(ms, count)| TimeSeriesPoint {
                    timestamp: millis_to_naive(*ms).unwrap(),
                    count: *count,
                    raw_timestamp: ms.to_string(),
                })
                .collect(),
            statistics: None,
            error: None,
        }
    }

    #[test]
    fn test_file_names() {
        let names = FileNames::new("usage", "2024_07", None);
        assert_eq!(names.series_csv(ResourceKind::Gpu), "usage_gpu_usage_2024_07.csv");
        assert_eq!(names.combined_csv(), "usage_combined_usage_2024_07.csv");
        assert_eq!(names.report_json("monthly"), "usage_monthly_report_2024_07.json");

        let stamped = FileNames::new(
            "usage",
            "2024_07",
            chrono::NaiveDate::from_ymd_opt(2024, 8, 1)
                .unwrap()
                .and_hms_opt(6, 5, 0),
        );
        assert_eq!(stamped.summary_csv("user"), "usage_user_summary_2024_07_20240801_0605.csv");
    }

    #[test]
    fn test_series_csv_rows() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path().join("nested/reports"));
        let cpu = usage(
            ResourceKind::Cpu,
            &[(1_720_000_000_000, 5), (1_720_000_060_000, 7), (1_720_000_120_000, 3)],
        );
        let path = exporter.write_series_csv(&cpu, "cpu.csv").unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,cpu_count");
        assert_eq!(lines[1], "2024-07-03T09:46:40,5");
    }

    #[test]
    fn test_empty_series_not_written() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let empty = usage(ResourceKind::Memory, &[]);
        assert!(matches!(
            exporter.write_series_csv(&empty, "m.csv"),
            Err(ExportError::Empty(_))
        ));
        assert!(!dir.path().join("m.csv").exists());
    }

    #[test]
    fn test_combined_csv_fills_missing_with_zero() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let cpu = usage(ResourceKind::Cpu, &[(1_720_000_000_000, 5), (1_720_000_060_000, 7)]);
        let gpu = usage(ResourceKind::Gpu, &[(1_720_000_060_000, 2)]);
        let path = exporter
            .write_combined_csv(&[&cpu, &gpu], "combined.csv")
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,cpu,gpu");
        assert_eq!(lines[1], "2024-07-03T09:46:40,5,0");
        assert_eq!(lines[2], "2024-07-03T09:47:40,7,2");
    }

    #[test]
    fn test_write_table_header_from_fields() {
        #[derive(Serialize)]
        struct Row {
            status: &'static str,
            count: usize,
        }
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let path = exporter
            .write_table(&[Row { status: "ok", count: 2 }], "s.csv")
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "status,count\nok,2\n");
    }
}
