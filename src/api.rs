//! Client for the platform usage API.
//!
//! `UsageApi` is the seam between the pipeline and the network; the HTTP
//! implementation speaks the v2 REST layout with bearer-token auth.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::models::ResourceKind;

const TIME_SERIES_PATH: &str = "/api/v2/timeseries";
const LIST_USAGE_PATH: &str = "/api/v2/usage";
const FILTER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Creation-time window sent as the API's JSON search filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRangeFilter {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
}

#[derive(Serialize)]
struct FilterBounds {
    min: String,
    max: String,
}

#[derive(Serialize)]
struct FilterBody {
    created_time: FilterBounds,
}

impl TimeRangeFilter {
    pub fn new(min: NaiveDateTime, max: NaiveDateTime) -> Self {
        TimeRangeFilter { min, max }
    }

    /// `{"created_time":{"min":"YYYY-MM-DD HH:MM:SS","max":"..."}}`
    pub fn to_json(&self) -> String {
        let body = FilterBody {
            created_time: FilterBounds {
                min: self.min.format(FILTER_TIME_FORMAT).to_string(),
                max: self.max.format(FILTER_TIME_FORMAT).to_string(),
            },
        };
        // Serializing two strings cannot fail
        serde_json::to_string(&body).unwrap_or_default()
    }
}

/// One raw time-series sample; both fields arrive as numbers or strings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPoint {
    #[serde(default)]
    pub time_stamp: Value,
    #[serde(default)]
    pub count: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsageRequest {
    pub page_size: u32,
    pub page_token: Option<String>,
    pub search_filter: Option<String>,
}

/// One page of workload records plus the continuation token
#[derive(Debug, Clone, Default)]
pub struct UsagePage {
    pub records: Vec<Value>,
    pub next_page_token: Option<String>,
}

pub trait UsageApi {
    fn time_series(
        &self,
        resource: ResourceKind,
        filter: &TimeRangeFilter,
    ) -> Result<Vec<RawPoint>, ApiError>;

    fn list_usage(&self, request: &ListUsageRequest) -> Result<UsagePage, ApiError>;
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResultDto {
    #[serde(default)]
    values: Option<Vec<RawPoint>>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponseDto {
    result: Option<TimeSeriesResultDto>,
}

#[derive(Debug, Deserialize)]
struct ListUsageResponseDto {
    #[serde(default)]
    usage_response: Option<Vec<Value>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub(crate) fn decode_time_series(url: &str, body: &str) -> Result<Vec<RawPoint>, ApiError> {
    let dto: TimeSeriesResponseDto = serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let result = dto.result.ok_or_else(|| ApiError::Decode {
        url: url.to_string(),
        reason: "missing 'result' object".to_string(),
    })?;
    Ok(result.values.unwrap_or_default())
}

pub(crate) fn decode_usage_page(url: &str, body: &str) -> Result<UsagePage, ApiError> {
    let dto: ListUsageResponseDto = serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(UsagePage {
        records: dto.usage_response.unwrap_or_default(),
        next_page_token: dto.next_page_token.filter(|t| !t.trim().is_empty()),
    })
}

/// Blocking HTTP client for the usage API
pub struct HttpUsageApi {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpUsageApi {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        HttpUsageApi {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let mut request = self
            .agent
            .get(url)
            .header("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let mut response = request.call().map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

impl UsageApi for HttpUsageApi {
    fn time_series(
        &self,
        resource: ResourceKind,
        filter: &TimeRangeFilter,
    ) -> Result<Vec<RawPoint>, ApiError> {
        let url = self.endpoint(TIME_SERIES_PATH);
        debug!(%url, %resource, "requesting time series");
        let body = self.get(
            &url,
            &[
                ("series_type", resource.as_str().to_string()),
                ("time_range_search_filter", filter.to_json()),
            ],
        )?;
        decode_time_series(&url, &body)
    }

    fn list_usage(&self, request: &ListUsageRequest) -> Result<UsagePage, ApiError> {
        let url = self.endpoint(LIST_USAGE_PATH);
        let mut query = vec![("page_size", request.page_size.to_string())];
        if let Some(token) = &request.page_token {
            query.push(("page_token", token.clone()));
        }
        if let Some(filter) = &request.search_filter {
            query.push(("search_filter", filter.clone()));
        }
        debug!(%url, has_token = request.page_token.is_some(), "requesting usage page");
        let body = self.get(&url, &query)?;
        decode_usage_page(&url, &body)
    }
}
