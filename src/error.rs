//! Error types for each layer of the report pipeline.
//!
//! Library code returns these typed errors; the binary wraps them in
//! `anyhow` at the process boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Failures resolving a reporting window
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid month {0}: expected 1-12")]
    InvalidMonth(u32),
    #[error("invalid day {day} for {year}-{month:02}: month has {max} days")]
    InvalidDay {
        year: i32,
        month: u32,
        day: u32,
        max: u32,
    },
    #[error("year {0} is out of range")]
    InvalidYear(i32),
}

/// Failures talking to the remote usage API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("{0}")]
    Other(String),
}

/// Failures writing report files
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv write to {path} failed: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("json write to {path} failed: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("write to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("nothing to export for {0}")]
    Empty(String),
}

/// Failures delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook delivery to {url} failed: {reason}")]
    Webhook { url: String, reason: String },
    #[error("console write failed: {0}")]
    Console(#[from] std::io::Error),
}

/// Failures loading the TOML configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown resource type '{0}' (expected cpu, memory or gpu)")]
    UnknownResource(String),
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
    #[error("no API URL configured (use --api-url, USAGE_REPORT_API_URL or api_url in the config file)")]
    MissingApiUrl,
}
