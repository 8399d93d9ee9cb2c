//! # Normalize Module
//!
//! Turns loosely-typed API payloads into uniform rows. Nothing here fails:
//! malformed numbers become zero, missing names become "Unknown".

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::api::RawPoint;
use crate::models::{MemoryDivisor, TimeSeriesPoint, UsageRecord};

pub const UNKNOWN: &str = "Unknown";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Numeric value of a JSON number or numeric string; 0.0 for anything else
pub fn coerce_f64(v: Option<&Value>) -> f64 {
    let parsed = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Parse a timestamp to a naive UTC instant.
///
/// Accepts RFC 3339 (offset converted to UTC), naive ISO forms with `T` or a
/// space, bare dates, and epoch milliseconds.
pub fn parse_timestamp(v: Option<&Value>) -> Option<NaiveDateTime> {
    match v? {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_utc());
            }
            for fmt in NAIVE_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(dt);
                }
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return d.and_hms_opt(0, 0, 0);
            }
            s.parse::<i64>().ok().and_then(millis_to_naive)
        }
        Value::Number(n) => n.as_i64().and_then(millis_to_naive),
        _ => None,
    }
}

pub fn millis_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

fn nested_name(raw: &Value, object: &str, field: &str) -> String {
    raw.get(object)
        .and_then(|o| o.as_object())
        .and_then(|o| o.get(field))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn text_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => UNKNOWN.to_string(),
    }
}

fn id_field(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub fn normalize_record(raw: &Value, divisor: MemoryDivisor) -> UsageRecord {
    let mut record = UsageRecord {
        id: id_field(raw),
        creator_username: nested_name(raw, "creator_info", "username"),
        project_name: nested_name(raw, "project_info", "name"),
        workload_type: text_field(raw, "workload_type"),
        status: text_field(raw, "status"),
        created_at: parse_timestamp(raw.get("created_at")),
        duration: coerce_f64(raw.get("duration")),
        cpu: coerce_f64(raw.get("cpu")),
        memory: coerce_f64(raw.get("memory")),
        nvidia_gpu: coerce_f64(raw.get("nvidia_gpu")),
        duration_hours: 0.0,
        cpu_hours: 0.0,
        gpu_hours: 0.0,
        memory_gb_hours: 0.0,
        has_gpu: false,
        is_long_running: false,
    };
    record.derive_metrics(divisor);
    record
}

pub fn normalize_records(raw: &[Value], divisor: MemoryDivisor) -> Vec<UsageRecord> {
    raw.iter().map(|r| normalize_record(r, divisor)).collect()
}

/// Convert raw samples to points sorted by timestamp; samples without a
/// usable timestamp are skipped
pub fn normalize_points(raw: &[RawPoint]) -> Vec<TimeSeriesPoint> {
    let mut points: Vec<TimeSeriesPoint> = raw
        .iter()
        .filter_map(|p| {
            let raw_timestamp = match &p.time_stamp {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            };
            let ms = raw_timestamp
                .parse::<i64>()
                .ok()
                .or_else(|| raw_timestamp.parse::<f64>().ok().map(|f| f as i64));
            let Some(timestamp) = ms.and_then(millis_to_naive) else {
                debug!(raw = %raw_timestamp, "skipping sample with unusable timestamp");
                return None;
            };
            Some(TimeSeriesPoint {
                timestamp,
                count: coerce_f64(Some(&p.count)) as i64,
                raw_timestamp,
            })
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}
