use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const LONG_RUNNING_HOURS: f64 = 1.0;

/// Divisor applied to raw memory allocations before computing GB-hours.
///
/// Deployments disagree on the unit; `Gib` treats the field as bytes,
/// `Kib` reproduces the older report that divided by 1024 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryDivisor {
    #[default]
    Gib,
    Kib,
}

impl MemoryDivisor {
    pub fn value(self) -> f64 {
        match self {
            MemoryDivisor::Gib => 1024.0 * 1024.0 * 1024.0,
            MemoryDivisor::Kib => 1024.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryDivisor::Gib => "gib",
            MemoryDivisor::Kib => "kib",
        }
    }
}

/// One workload execution, normalized with derived resource-hour metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub id: String,
    pub creator_username: String,
    pub project_name: String,
    pub workload_type: String,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    /// Seconds
    pub duration: f64,
    /// Cores
    pub cpu: f64,
    /// Raw allocation as reported upstream
    pub memory: f64,
    pub nvidia_gpu: f64,
    pub duration_hours: f64,
    pub cpu_hours: f64,
    pub gpu_hours: f64,
    pub memory_gb_hours: f64,
    pub has_gpu: bool,
    pub is_long_running: bool,
}

impl UsageRecord {
    /// Recompute every derived field from the raw allocations
    pub fn derive_metrics(&mut self, divisor: MemoryDivisor) {
        self.duration_hours = self.duration / SECONDS_PER_HOUR;
        self.cpu_hours = self.cpu * self.duration_hours;
        self.gpu_hours = self.nvidia_gpu * self.duration_hours;
        self.memory_gb_hours = (self.memory / divisor.value()) * self.duration_hours;
        self.has_gpu = self.nvidia_gpu > 0.0;
        self.is_long_running = self.duration_hours > LONG_RUNNING_HOURS;
    }
}

/// Flattened row written to the detailed CSV
#[derive(Debug, Serialize)]
pub struct DetailedRow<'a> {
    pub created_at: String,
    pub creator_username: &'a str,
    pub project_name: &'a str,
    pub workload_type: &'a str,
    pub status: &'a str,
    pub duration_hours: f64,
    pub cpu: f64,
    pub memory: f64,
    pub nvidia_gpu: f64,
    pub cpu_hours: f64,
    pub memory_gb_hours: f64,
    pub gpu_hours: f64,
    pub has_gpu: bool,
}

impl<'a> From<&'a UsageRecord> for DetailedRow<'a> {
    fn from(r: &'a UsageRecord) -> Self {
        DetailedRow {
            created_at: r
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            creator_username: &r.creator_username,
            project_name: &r.project_name,
            workload_type: &r.workload_type,
            status: &r.status,
            duration_hours: r.duration_hours,
            cpu: r.cpu,
            memory: r.memory,
            nvidia_gpu: r.nvidia_gpu,
            cpu_hours: r.cpu_hours,
            memory_gb_hours: r.memory_gb_hours,
            gpu_hours: r.gpu_hours,
            has_gpu: r.has_gpu,
        }
    }
}
