use serde::Serialize;

/// Per-user totals; the user summary CSV row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub creator_username: String,
    pub total_cpu_hours: f64,
    pub total_memory_gb_hours: f64,
    pub total_gpu_hours: f64,
    pub total_workloads: usize,
    pub gpu_workloads: usize,
    pub avg_duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_name: String,
    pub total_cpu_hours: f64,
    pub total_memory_gb_hours: f64,
    pub total_gpu_hours: f64,
    pub total_workloads: usize,
    pub unique_users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSummary {
    pub workload_type: String,
    pub total_cpu_hours: f64,
    pub total_memory_gb_hours: f64,
    pub total_gpu_hours: f64,
    pub total_runs: usize,
    pub avg_duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub status: String,
    pub count: usize,
    pub total_cpu_hours: f64,
}

/// The four grouped tables produced from one record set
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryTables {
    pub users: Vec<UserSummary>,
    pub projects: Vec<ProjectSummary>,
    pub workloads: Vec<WorkloadSummary>,
    pub statuses: Vec<StatusSummary>,
}

/// Totals across every normalized record in the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_records: usize,
    pub total_cpu_hours: f64,
    pub total_gpu_hours: f64,
    pub total_memory_gb_hours: f64,
    pub unique_users: usize,
    pub unique_projects: usize,
    pub date_range_days: i64,
}
