use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::record::UsageRecord;
use super::series::{ResourceKind, SeriesStats, TimeSeriesPoint};
use super::summary::{DataSummary, SummaryTables};

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: NaiveDateTime,
    pub report_period: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub range_strategy: String,
    pub mode: String,
    pub api_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_divisor: Option<String>,
}

/// Outcome of fetching one resource dimension in time-series mode
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUsage {
    pub success: bool,
    pub series_type: ResourceKind,
    pub data_points: Vec<TimeSeriesPoint>,
    pub statistics: Option<SeriesStats>,
    pub error: Option<String>,
}

impl ResourceUsage {
    /// Succeeded and produced at least one point
    pub fn is_usable(&self) -> bool {
        self.success && !self.data_points.is_empty()
    }
}

/// Outcome of record-listing mode
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordSection {
    pub success: bool,
    pub record_count: usize,
    pub pages_fetched: usize,
    pub truncated: bool,
    pub filtered_out: usize,
    pub error: Option<String>,
    pub records: Vec<UsageRecord>,
    pub summaries: Option<SummaryTables>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub successful_resources: usize,
    pub failed_resources: usize,
    pub total_data_points: usize,
    pub resources_processed: Vec<ResourceKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub records_fetched: usize,
    pub records_processed: usize,
    pub files_exported: usize,
}

/// Envelope serialized as the run's JSON report. Sections stay empty or
/// `None` when the stage that fills them did not complete.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub report_metadata: ReportMetadata,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_usage: BTreeMap<ResourceKind, ResourceUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_records: Option<RecordSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_summary: Option<DataSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_summary: Option<ProcessingSummary>,
    pub export_files: Vec<String>,
}

impl Report {
    pub fn new(report_metadata: ReportMetadata) -> Self {
        Report {
            report_metadata,
            resource_usage: BTreeMap::new(),
            usage_records: None,
            summary: None,
            data_summary: None,
            processing_summary: None,
            export_files: Vec::new(),
        }
    }
}
