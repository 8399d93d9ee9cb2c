//! # Aggregate Module
//!
//! Groups normalized records by user, project, workload type and status.
//!
//! Aggregated values are rounded to two decimals. Each table is sorted
//! descending by its primary metric; equal metrics keep ascending key order.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    DataSummary, ProjectSummary, StatusSummary, SummaryTables, UsageRecord, UserSummary,
    WorkloadSummary,
};

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Default)]
struct Totals<'a> {
    cpu_hours: f64,
    memory_gb_hours: f64,
    gpu_hours: f64,
    duration_hours: f64,
    rows: usize,
    gpu_rows: usize,
    users: BTreeSet<&'a str>,
}

impl<'a> Totals<'a> {
    fn add(&mut self, r: &'a UsageRecord) {
        self.cpu_hours += r.cpu_hours;
        self.memory_gb_hours += r.memory_gb_hours;
        self.gpu_hours += r.gpu_hours;
        self.duration_hours += r.duration_hours;
        self.rows += 1;
        if r.has_gpu {
            self.gpu_rows += 1;
        }
        self.users.insert(&r.creator_username);
    }

    fn avg_duration(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.duration_hours / self.rows as f64
        }
    }
}

fn group_by<'a, F>(records: &'a [UsageRecord], key: F) -> BTreeMap<&'a str, Totals<'a>>
where
    F: Fn(&'a UsageRecord) -> &'a str,
{
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();
    for r in records {
        groups.entry(key(r)).or_default().add(r);
    }
    groups
}

pub fn summarize_users(records: &[UsageRecord]) -> Vec<UserSummary> {
    let mut rows: Vec<UserSummary> = group_by(records, |r| r.creator_username.as_str())
        .into_iter()
        .map(|(name, t)| UserSummary {
            creator_username: name.to_string(),
            total_cpu_hours: round2(t.cpu_hours),
            total_memory_gb_hours: round2(t.memory_gb_hours),
            total_gpu_hours: round2(t.gpu_hours),
            total_workloads: t.rows,
            gpu_workloads: t.gpu_rows,
            avg_duration_hours: round2(t.avg_duration()),
        })
        .collect();
    rows.sort_by(|a, b| b.total_cpu_hours.total_cmp(&a.total_cpu_hours));
    rows
}

pub fn summarize_projects(records: &[UsageRecord]) -> Vec<ProjectSummary> {
    let mut rows: Vec<ProjectSummary> = group_by(records, |r| r.project_name.as_str())
        .into_iter()
        .map(|(name, t)| ProjectSummary {
            project_name: name.to_string(),
            total_cpu_hours: round2(t.cpu_hours),
            total_memory_gb_hours: round2(t.memory_gb_hours),
            total_gpu_hours: round2(t.gpu_hours),
            total_workloads: t.rows,
            unique_users: t.users.len(),
        })
        .collect();
    rows.sort_by(|a, b| b.total_cpu_hours.total_cmp(&a.total_cpu_hours));
    rows
}

pub fn summarize_workloads(records: &[UsageRecord]) -> Vec<WorkloadSummary> {
    let mut rows: Vec<WorkloadSummary> = group_by(records, |r| r.workload_type.as_str())
        .into_iter()
        .map(|(kind, t)| WorkloadSummary {
            workload_type: kind.to_string(),
            total_cpu_hours: round2(t.cpu_hours),
            total_memory_gb_hours: round2(t.memory_gb_hours),
            total_gpu_hours: round2(t.gpu_hours),
            total_runs: t.rows,
            avg_duration_hours: round2(t.avg_duration()),
        })
        .collect();
    rows.sort_by(|a, b| b.total_runs.cmp(&a.total_runs));
    rows
}

pub fn summarize_statuses(records: &[UsageRecord]) -> Vec<StatusSummary> {
    let mut rows: Vec<StatusSummary> = group_by(records, |r| r.status.as_str())
        .into_iter()
        .map(|(status, t)| StatusSummary {
            status: status.to_string(),
            count: t.rows,
            total_cpu_hours: round2(t.cpu_hours),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

pub fn summarize_all(records: &[UsageRecord]) -> SummaryTables {
    SummaryTables {
        users: summarize_users(records),
        projects: summarize_projects(records),
        workloads: summarize_workloads(records),
        statuses: summarize_statuses(records),
    }
}

/// Run-wide totals at full precision
pub fn data_summary(records: &[UsageRecord], date_range_days: i64) -> DataSummary {
    let users: BTreeSet<&str> = records.iter().map(|r| r.creator_username.as_str()).collect();
    let projects: BTreeSet<&str> = records.iter().map(|r| r.project_name.as_str()).collect();
    DataSummary {
        total_records: records.len(),
        total_cpu_hours: records.iter().map(|r| r.cpu_hours).sum(),
        total_gpu_hours: records.iter().map(|r| r.gpu_hours).sum(),
        total_memory_gb_hours: records.iter().map(|r| r.memory_gb_hours).sum(),
        unique_users: users.len(),
        unique_projects: projects.len(),
        date_range_days,
    }
}
