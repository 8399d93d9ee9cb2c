//! # Fetch Module
//!
//! Drives the usage API in either retrieval mode. Errors never escape as
//! panics; each dimension or listing comes back as its own `Result` so the
//! pipeline can carry on with partial data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{ListUsageRequest, RawPoint, TimeRangeFilter, UsageApi};
use crate::error::ApiError;
use crate::models::ResourceKind;
use crate::normalize::parse_timestamp;
use crate::period::ReportPeriod;

pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Where the creation-time window is applied in listing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Send the window as the API's search filter
    #[default]
    Server,
    /// Fetch everything and compare `created_at` locally
    Client,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::Server => "server",
            FilterMode::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    pub page_size: u32,
    pub max_pages: usize,
    pub filter: FilterMode,
}

impl Default for ListingOptions {
    fn default() -> Self {
        ListingOptions {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            filter: FilterMode::Server,
        }
    }
}

/// Result of one resource dimension in time-series mode
#[derive(Debug)]
pub struct SeriesFetch {
    pub resource: ResourceKind,
    pub result: Result<Vec<RawPoint>, ApiError>,
}

/// Records gathered by the listing loop
#[derive(Debug, Default)]
pub struct RecordFetch {
    /// Records inside the window
    pub records: Vec<Value>,
    pub pages: usize,
    /// Records returned by the API before any client-side filtering
    pub fetched: usize,
    pub filtered_out: usize,
    /// The page ceiling stopped the loop while a token was still pending
    pub truncated: bool,
    /// A later page failed; `records` holds what arrived before it
    pub error: Option<String>,
}

pub fn fetch_time_series(
    api: &dyn UsageApi,
    resources: &[ResourceKind],
    period: &ReportPeriod,
) -> Vec<SeriesFetch> {
    let filter = TimeRangeFilter::new(period.start, period.end);
    resources
        .iter()
        .map(|&resource| {
            info!(
                %resource,
                start = %period.start.format("%Y-%m-%d"),
                end = %period.end.format("%Y-%m-%d"),
                "fetching time series"
            );
            let result = api.time_series(resource, &filter);
            match &result {
                Ok(points) => info!(%resource, points = points.len(), "time series fetched"),
                Err(e) => warn!(%resource, error = %e, "time series fetch failed"),
            }
            SeriesFetch { resource, result }
        })
        .collect()
}

fn in_window(record: &Value, period: &ReportPeriod) -> bool {
    parse_timestamp(record.get("created_at")).is_some_and(|ts| period.contains(ts))
}

/// Page through the listing endpoint until the continuation token runs out.
///
/// Fails only when the first page fails. A later failure or hitting
/// `max_pages` keeps the records already collected.
pub fn fetch_records(
    api: &dyn UsageApi,
    period: &ReportPeriod,
    options: &ListingOptions,
) -> Result<RecordFetch, ApiError> {
    let search_filter = match options.filter {
        FilterMode::Server => Some(TimeRangeFilter::new(period.start, period.end).to_json()),
        FilterMode::Client => None,
    };
    let mut out = RecordFetch::default();
    let mut page_token: Option<String> = None;

    loop {
        if out.pages >= options.max_pages {
            warn!(
                pages = out.pages,
                records = out.fetched,
                "page ceiling reached with a continuation token pending; keeping partial results"
            );
            out.truncated = true;
            break;
        }

        let request = ListUsageRequest {
            page_size: options.page_size,
            page_token: page_token.take(),
            search_filter: search_filter.clone(),
        };
        let page = match api.list_usage(&request) {
            Ok(page) => page,
            Err(e) if out.pages == 0 => return Err(e),
            Err(e) => {
                warn!(page = out.pages + 1, error = %e, "usage page failed; keeping earlier pages");
                out.error = Some(e.to_string());
                break;
            }
        };
        out.pages += 1;
        out.fetched += page.records.len();

        match options.filter {
            FilterMode::Server => out.records.extend(page.records),
            FilterMode::Client => {
                for record in page.records {
                    if in_window(&record, period) {
                        out.records.push(record);
                    } else {
                        out.filtered_out += 1;
                    }
                }
            }
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    info!(
        pages = out.pages,
        fetched = out.fetched,
        kept = out.records.len(),
        "usage listing complete"
    );
    Ok(out)
}
