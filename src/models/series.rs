use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Resource dimension served by the time-series endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Gpu,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Cpu, ResourceKind::Memory, ResourceKind::Gpu];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Gpu => "gpu",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ResourceKind::Cpu),
            "memory" | "mem" => Ok(ResourceKind::Memory),
            "gpu" => Ok(ResourceKind::Gpu),
            other => Err(ConfigError::UnknownResource(other.to_string())),
        }
    }
}

/// One sample of a resource time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: NaiveDateTime,
    pub count: i64,
    /// Millisecond timestamp exactly as the API returned it
    pub raw_timestamp: String,
}

impl TimeSeriesPoint {
    pub fn timestamp_str(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub total_data_points: usize,
    pub min_count: i64,
    pub max_count: i64,
    pub avg_count: f64,
    pub total_count: i64,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

impl SeriesStats {
    /// Statistics over points already sorted by timestamp
    pub fn from_points(points: &[TimeSeriesPoint]) -> Self {
        let Some(first) = points.first() else {
            return SeriesStats {
                total_data_points: 0,
                min_count: 0,
                max_count: 0,
                avg_count: 0.0,
                total_count: 0,
                first_timestamp: None,
                last_timestamp: None,
            };
        };
        let total = points.iter().fold(0i64, |acc, p| acc.saturating_add(p.count));
        let float_total: f64 = points.iter().map(|p| p.count as f64).sum();
        SeriesStats {
            total_data_points: points.len(),
            min_count: points.iter().map(|p| p.count).min().unwrap_or(0),
            max_count: points.iter().map(|p| p.count).max().unwrap_or(0),
            avg_count: float_total / points.len() as f64,
            total_count: total,
            first_timestamp: Some(first.timestamp_str()),
            last_timestamp: points.last().map(TimeSeriesPoint::timestamp_str),
        }
    }
}
