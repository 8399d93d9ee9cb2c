//! # Pipeline Module
//!
//! One run of the report: fetch, normalize, aggregate, export, notify and
//! pick the exit code. Both retrieval modes share the same envelope, export
//! root and notification contract.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::aggregate::{data_summary, summarize_all};
use crate::api::UsageApi;
use crate::config::{FetchMode, ReportConfig};
use crate::display;
use crate::error::ExportError;
use crate::export::{Exporter, FileNames};
use crate::fetch::{fetch_records, fetch_time_series};
use crate::models::{
    ProcessingSummary, RecordSection, Report, ReportMetadata, ResourceUsage, RunSummary,
    SeriesStats,
};
use crate::normalize::{normalize_points, normalize_records};
use crate::notify::Notifier;
use crate::period::{RangeStrategy, ReportPeriod};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub report: Report,
    pub json_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}

/// `monthly` for the scheduled previous-month run, `custom` otherwise
pub fn report_kind(strategy: RangeStrategy) -> &'static str {
    match strategy {
        RangeStrategy::LastMonth => "monthly",
        _ => "custom",
    }
}

pub fn success_subject(period: &ReportPeriod) -> String {
    format!("Usage Report - {}", period.label)
}

pub fn failure_subject(period: &ReportPeriod) -> String {
    format!("Usage Report ERROR - {}", period.label)
}

pub const CRITICAL_SUBJECT: &str = "Usage Report CRITICAL ERROR";

pub struct ReportRunner<'a> {
    config: &'a ReportConfig,
    api: &'a dyn UsageApi,
    notifier: &'a dyn Notifier,
    exporter: Exporter,
    /// Print banner, insights and summary to stdout
    pub console: bool,
}

impl<'a> ReportRunner<'a> {
    pub fn new(config: &'a ReportConfig, api: &'a dyn UsageApi, notifier: &'a dyn Notifier) -> Self {
        ReportRunner {
            config,
            api,
            notifier,
            exporter: Exporter::new(&config.output_dir),
            console: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn run(&self, period: &ReportPeriod, now: NaiveDateTime) -> RunOutcome {
        if self.console {
            let title = match self.config.mode {
                FetchMode::Timeseries => "Usage Report",
                FetchMode::Records => "Enhanced Usage Report (list_usage)",
            };
            display::print_banner(title, period);
        }
        info!(
            period = %period.label,
            mode = self.config.mode.as_str(),
            output = %self.exporter.root().display(),
            "starting report run"
        );
        let report = Report::new(self.metadata(period, now));
        match self.config.mode {
            FetchMode::Timeseries => self.run_time_series(period, report),
            FetchMode::Records => self.run_records(period, now, report),
        }
    }

    fn metadata(&self, period: &ReportPeriod, now: NaiveDateTime) -> ReportMetadata {
        let records = self.config.mode == FetchMode::Records;
        ReportMetadata {
            generated_at: now,
            report_period: period.label.clone(),
            start_date: period.start,
            end_date: period.end,
            range_strategy: period.strategy.kind().to_string(),
            mode: self.config.mode.as_str().to_string(),
            api_method: self.config.mode.api_method().to_string(),
            filter_mode: records.then(|| self.config.listing.filter.as_str().to_string()),
            memory_divisor: records.then(|| self.config.memory_divisor.as_str().to_string()),
        }
    }

    fn run_time_series(&self, period: &ReportPeriod, mut report: Report) -> RunOutcome {
        let names = FileNames::new(&self.config.file_prefix, &period.filename_tag(), None);

        for fetched in fetch_time_series(self.api, &self.config.resources, period) {
            let resource = fetched.resource;
            let usage = match fetched.result {
                Ok(raw) => {
                    let points = normalize_points(&raw);
                    let stats = SeriesStats::from_points(&points);
                    info!(
                        %resource,
                        points = stats.total_data_points,
                        avg = stats.avg_count,
                        "series normalized"
                    );
                    ResourceUsage {
                        success: true,
                        series_type: resource,
                        data_points: points,
                        statistics: Some(stats),
                        error: None,
                    }
                }
                Err(e) => ResourceUsage {
                    success: false,
                    series_type: resource,
                    data_points: Vec::new(),
                    statistics: None,
                    error: Some(e.to_string()),
                },
            };
            if usage.is_usable() {
                record_export(
                    &mut report.export_files,
                    self.exporter.write_series_csv(&usage, &names.series_csv(resource)),
                );
            }
            report.resource_usage.insert(resource, usage);
        }

        let usable: Vec<&ResourceUsage> = self
            .config
            .resources
            .iter()
            .filter_map(|kind| report.resource_usage.get(kind))
            .filter(|usage| usage.is_usable())
            .collect();
        if !usable.is_empty() {
            record_export(
                &mut report.export_files,
                self.exporter.write_combined_csv(&usable, &names.combined_csv()),
            );
        }
        let usable_count = usable.len();

        let successful = report.resource_usage.values().filter(|u| u.success).count();
        report.summary = Some(RunSummary {
            successful_resources: successful,
            failed_resources: report.resource_usage.len() - successful,
            total_data_points: report
                .resource_usage
                .values()
                .map(|u| u.data_points.len())
                .sum(),
            resources_processed: report
                .resource_usage
                .values()
                .filter(|u| u.success)
                .map(|u| u.series_type)
                .collect(),
        });

        let json_path = self.save_json(&mut report, &names, period);
        if self.console {
            display::print_run_summary(&report);
        }

        if usable_count > 0 {
            let resources: Vec<&str> = report
                .resource_usage
                .values()
                .filter(|u| u.is_usable())
                .map(|u| u.series_type.as_str())
                .collect();
            let total_points = report.summary.as_ref().map_or(0, |s| s.total_data_points);
            let body = format!(
                "Usage report completed successfully!\n\nPeriod: {}\nResources: {}\nData points: {}\nFiles: {} files generated\n\nFiles created:\n{}",
                period.label,
                resources.join(", "),
                total_points,
                report.export_files.len(),
                file_list(&report.export_files)
            );
            self.finish(report, json_path, Ok(body), period)
        } else {
            let message = format!("Usage report FAILED - no data collected for {}", period.label);
            self.finish(report, json_path, Err(message), period)
        }
    }

    fn run_records(&self, period: &ReportPeriod, now: NaiveDateTime, mut report: Report) -> RunOutcome {
        let names = FileNames::new(&self.config.file_prefix, &period.filename_tag(), Some(now));
        let mut section = RecordSection::default();

        let fetched = match fetch_records(self.api, period, &self.config.listing) {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "usage listing failed");
                section.error = Some(e.to_string());
                report.usage_records = Some(section);
                let json_path = self.save_json(&mut report, &names, period);
                let message = format!("Enhanced usage report FAILED - {e}");
                return self.finish(report, json_path, Err(message), period);
            }
        };

        section.pages_fetched = fetched.pages;
        section.truncated = fetched.truncated;
        section.filtered_out = fetched.filtered_out;
        section.error = fetched.error.clone();
        let records = normalize_records(&fetched.records, self.config.memory_divisor);
        section.record_count = records.len();
        section.success = !records.is_empty();
        info!(records = records.len(), "records processed with derived metrics");

        if records.is_empty() {
            report.usage_records = Some(section);
            let json_path = self.save_json(&mut report, &names, period);
            let message = format!(
                "Enhanced usage report FAILED - no processable data for {}",
                period.label
            );
            return self.finish(report, json_path, Err(message), period);
        }

        let tables = summarize_all(&records);
        let data = data_summary(&records, period.date_range_days());
        if self.console {
            display::print_insights(&data, &tables);
        }

        let files = &mut report.export_files;
        record_export(
            files,
            self.exporter.write_detailed_csv(&records, &names.detailed_csv()),
        );
        record_export(
            files,
            self.exporter.write_table(&tables.users, &names.summary_csv("user")),
        );
        record_export(
            files,
            self.exporter.write_table(&tables.projects, &names.summary_csv("project")),
        );
        record_export(
            files,
            self.exporter.write_table(&tables.workloads, &names.summary_csv("workload")),
        );
        record_export(
            files,
            self.exporter.write_table(&tables.statuses, &names.summary_csv("status")),
        );

        report.processing_summary = Some(ProcessingSummary {
            records_fetched: fetched.fetched,
            records_processed: records.len(),
            files_exported: report.export_files.len(),
        });
        section.records = records;
        section.summaries = Some(tables);
        report.usage_records = Some(section);
        report.data_summary = Some(data.clone());

        let json_path = self.save_json(&mut report, &names, period);
        if self.console {
            display::print_run_summary(&report);
        }

        let body = format!(
            "Enhanced usage report completed successfully!\n\nPeriod: {}\nRecords Processed: {}\nTotal CPU Hours: {:.1}\nTotal GPU Hours: {:.1}\nUnique Users: {}\nUnique Projects: {}\n\nFiles Generated: {}\n{}",
            period.label,
            data.total_records,
            data.total_cpu_hours,
            data.total_gpu_hours,
            data.unique_users,
            data.unique_projects,
            report.export_files.len(),
            file_list(&report.export_files)
        );
        self.finish(report, json_path, Ok(body), period)
    }

    /// The JSON report is written on every path, including failures
    fn save_json(&self, report: &mut Report, names: &FileNames, period: &ReportPeriod) -> Option<PathBuf> {
        let filename = names.report_json(report_kind(period.strategy));
        match self.exporter.write_json(report, &filename) {
            Ok(path) => {
                report.export_files.push(path.display().to_string());
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "json report not written");
                None
            }
        }
    }

    /// Send the single final notification and settle the exit code
    fn finish(
        &self,
        report: Report,
        json_path: Option<PathBuf>,
        outcome: Result<String, String>,
        period: &ReportPeriod,
    ) -> RunOutcome {
        let (exit_code, subject, body) = match outcome {
            Ok(body) => (EXIT_OK, success_subject(period), body),
            Err(message) => (EXIT_FAILURE, failure_subject(period), message),
        };
        if let Err(e) = self.notifier.send(&subject, &body) {
            warn!(error = %e, "notification failed");
        }
        if self.console {
            if exit_code == EXIT_OK {
                display::print_outcome(true, "Report completed successfully!");
            } else {
                display::print_outcome(false, "Report failed - no data collected!");
            }
        }
        info!(exit_code, files = report.export_files.len(), "report run finished");
        RunOutcome {
            exit_code,
            report,
            json_path,
        }
    }
}

fn file_list(files: &[String]) -> String {
    files
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn record_export(files: &mut Vec<String>, result: Result<PathBuf, ExportError>) {
    match result {
        Ok(path) => files.push(path.display().to_string()),
        Err(ExportError::Empty(name)) => info!(file = %name, "nothing to export"),
        Err(e) => warn!(error = %e, "export failed"),
    }
}
