use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use usage_report::api::{ListUsageRequest, RawPoint, TimeRangeFilter, UsageApi, UsagePage};
use usage_report::config::{FetchMode, ReportConfig};
use usage_report::error::{ApiError, NotifyError};
use usage_report::fetch::{FilterMode, ListingOptions};
use usage_report::models::ResourceKind;
use usage_report::notify::Notifier;
use usage_report::period::{RangeStrategy, ReportPeriod};
use usage_report::pipeline::ReportRunner;

/// Serves `pages` in order; an `Err` entry fails that page
struct ListingApi {
    pages: Vec<Result<Vec<Value>, String>>,
    requests: RefCell<Vec<ListUsageRequest>>,
}

impl ListingApi {
    fn new(pages: Vec<Result<Vec<Value>, String>>) -> Self {
        ListingApi {
            pages,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl UsageApi for ListingApi {
    fn time_series(
        &self,
        _resource: ResourceKind,
        _filter: &TimeRangeFilter,
    ) -> Result<Vec<RawPoint>, ApiError> {
        Err(ApiError::Other("time series not used in records mode".into()))
    }

    fn list_usage(&self, request: &ListUsageRequest) -> Result<UsagePage, ApiError> {
        let index = self.requests.borrow().len();
        self.requests.borrow_mut().push(request.clone());
        match self.pages.get(index) {
            Some(Ok(records)) => Ok(UsagePage {
                records: records.clone(),
                next_page_token: (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1)),
            }),
            Some(Err(reason)) => Err(ApiError::Other(reason.clone())),
            None => Ok(UsagePage::default()),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .borrow_mut()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn workload(
    user: &str,
    project: &str,
    kind: &str,
    created_at: &str,
    duration: f64,
    cpu: f64,
    gpu: f64,
) -> Value {
    json!({
        "id": format!("{user}-{created_at}"),
        "creator_info": {"username": user},
        "project_info": {"name": project},
        "workload_type": kind,
        "status": "succeeded",
        "created_at": created_at,
        "duration": duration,
        "cpu": cpu,
        "memory": 2_147_483_648u64,
        "nvidia_gpu": gpu,
    })
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, 3)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn last_month() -> ReportPeriod {
    ReportPeriod::resolve(RangeStrategy::LastMonth, now()).unwrap()
}

fn config(dir: &TempDir, filter: FilterMode) -> ReportConfig {
    ReportConfig {
        output_dir: dir.path().join("out"),
        file_prefix: "enhanced".into(),
        mode: FetchMode::Records,
        range: RangeStrategy::LastMonth,
        listing: ListingOptions {
            page_size: 2,
            max_pages: 10,
            filter,
        },
        ..Default::default()
    }
}

fn out(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join("out").join(name)
}

fn read_json(path: &PathBuf) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn tied_users_keep_name_order() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Server);
    let api = ListingApi::new(vec![
        Ok(vec![
            workload("bob", "vision", "job", "2024-07-10T08:00:00Z", 1800.0, 4.0, 0.0),
            workload("alice", "vision", "job", "2024-07-11T08:00:00Z", 3600.0, 2.0, 0.0),
        ]),
        Ok(vec![workload(
            "carol",
            "nlp",
            "session",
            "2024-07-12T08:00:00Z",
            600.0,
            1.0,
            1.0,
        )]),
    ]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(api.requests.borrow().len(), 2);
    assert_eq!(api.requests.borrow()[1].page_token.as_deref(), Some("page-1"));

    let users = fs::read_to_string(out(&dir, "enhanced_user_summary_2024_07_20240803_0900.csv")).unwrap();
    let lines: Vec<&str> = users.lines().collect();
    assert!(lines[0].starts_with("creator_username,total_cpu_hours"));
    assert!(lines[1].starts_with("alice,2.0,"));
    assert!(lines[2].starts_with("bob,2.0,"));
    assert!(lines[3].starts_with("carol,"));

    let detailed =
        fs::read_to_string(out(&dir, "enhanced_detailed_usage_2024_07_20240803_0900.csv")).unwrap();
    assert_eq!(detailed.lines().count(), 4);
    for table in ["project", "workload", "status"] {
        let name = format!("enhanced_{table}_summary_2024_07_20240803_0900.csv");
        assert!(out(&dir, &name).exists(), "{name} missing");
    }

    let report = read_json(outcome.json_path.as_ref().unwrap());
    assert!(
        outcome
            .json_path
            .unwrap()
            .ends_with("enhanced_monthly_report_2024_07_20240803_0900.json")
    );
    assert_eq!(report["report_metadata"]["api_method"], json!("list_usage"));
    assert_eq!(report["report_metadata"]["memory_divisor"], json!("gib"));
    assert_eq!(report["data_summary"]["total_records"], json!(3));
    assert_eq!(report["data_summary"]["unique_projects"], json!(2));
    assert_eq!(report["data_summary"]["date_range_days"], json!(30));
    assert_eq!(report["processing_summary"]["records_fetched"], json!(3));
    assert_eq!(report["processing_summary"]["files_exported"], json!(5));
    assert_eq!(report["usage_records"]["pages_fetched"], json!(2));

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "Usage Report - 2024-07");
    assert!(sent[0].1.contains("Records Processed: 3"));
}

#[test]
fn server_filter_is_sent_with_every_page() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Server);
    let api = ListingApi::new(vec![
        Ok(vec![workload("a", "p", "job", "2024-07-01T00:00:00Z", 60.0, 1.0, 0.0)]),
        Ok(vec![workload("b", "p", "job", "2024-07-02T00:00:00Z", 60.0, 1.0, 0.0)]),
    ]);
    let notifier = RecordingNotifier::default();
    ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());

    let requests = api.requests.borrow();
    assert!(requests.iter().all(|r| r.page_size == 2));
    assert!(requests.iter().all(|r| {
        r.search_filter
            .as_deref()
            .is_some_and(|f| f.contains("2024-07-01 00:00:00"))
    }));
}

#[test]
fn client_filter_drops_records_outside_window() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Client);
    let api = ListingApi::new(vec![Ok(vec![
        workload("a", "p", "job", "2024-06-30T23:59:00Z", 3600.0, 1.0, 0.0),
        workload("b", "p", "job", "2024-07-15T12:00:00Z", 3600.0, 1.0, 0.0),
        workload("c", "p", "job", "not a date", 3600.0, 1.0, 0.0),
    ])]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 0);
    assert!(api.requests.borrow()[0].search_filter.is_none());

    let section = outcome.report.usage_records.as_ref().unwrap();
    assert_eq!(section.record_count, 1);
    assert_eq!(section.filtered_out, 2);
    assert_eq!(section.records[0].creator_username, "b");
    assert_eq!(
        outcome.report.processing_summary.as_ref().unwrap().records_fetched,
        3
    );
}

#[test]
fn first_page_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Server);
    let api = ListingApi::new(vec![Err("HTTP 401".into())]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 1);

    let report = read_json(outcome.json_path.as_ref().unwrap());
    assert!(
        report["usage_records"]["error"]
            .as_str()
            .unwrap()
            .contains("401")
    );
    assert!(!out(&dir, "enhanced_detailed_usage_2024_07_20240803_0900.csv").exists());

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "Usage Report ERROR - 2024-07");
}

#[test]
fn later_page_failure_keeps_earlier_records() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Server);
    let api = ListingApi::new(vec![
        Ok(vec![
            workload("a", "p", "job", "2024-07-01T00:00:00Z", 3600.0, 1.0, 0.0),
            workload("b", "p", "job", "2024-07-02T00:00:00Z", 3600.0, 1.0, 0.0),
        ]),
        Err("connection reset".into()),
    ]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 0);

    let section = outcome.report.usage_records.as_ref().unwrap();
    assert_eq!(section.record_count, 2);
    assert_eq!(section.pages_fetched, 1);
    assert!(section.error.as_deref().unwrap().contains("connection reset"));
}

#[test]
fn empty_listing_exits_one_with_json() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, FilterMode::Server);
    let api = ListingApi::new(vec![Ok(vec![])]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 1);
    assert!(outcome.json_path.unwrap().exists());

    let csv_count = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "csv"))
        .count();
    assert_eq!(csv_count, 0);
}

#[test]
fn page_ceiling_marks_truncated() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir, FilterMode::Server);
    cfg.listing.max_pages = 1;
    let api = ListingApi::new(vec![
        Ok(vec![workload("a", "p", "job", "2024-07-01T00:00:00Z", 60.0, 1.0, 0.0)]),
        Ok(vec![workload("b", "p", "job", "2024-07-02T00:00:00Z", 60.0, 1.0, 0.0)]),
    ]);
    let notifier = RecordingNotifier::default();

    let outcome = ReportRunner::new(&cfg, &api, &notifier)
        .quiet()
        .run(&last_month(), now());
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(api.requests.borrow().len(), 1);
    let section = outcome.report.usage_records.as_ref().unwrap();
    assert!(section.truncated);
    assert_eq!(section.record_count, 1);
}
