//! # Display Module
//!
//! Console rendering of a finished run: banner, run summary and, for record
//! listings, the data insights tables. Everything renders to a `String`
//! first; the `print_*` helpers only write it to stdout.

use std::fmt::Write as _;
use std::io::{self, Write};

#[cfg(feature = "colors")]
use owo_colors::OwoColorize;

// Provide a no-op color shim when "colors" feature is disabled
#[cfg(not(feature = "colors"))]
pub mod color_shim {
    use std::fmt::{self, Display, Formatter};

    #[derive(Clone)]
    pub struct Plain(pub String);

    impl Display for Plain {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    pub trait ColorizeShim {
        fn as_str(&self) -> &str;

        fn bold(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn green(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn red(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn yellow(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn cyan(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn bright_black(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
    }

    impl ColorizeShim for &str {
        fn as_str(&self) -> &str {
            self
        }
    }
    impl ColorizeShim for String {
        fn as_str(&self) -> &str {
            self.as_str()
        }
    }
    impl ColorizeShim for Plain {
        fn as_str(&self) -> &str {
            &self.0
        }
    }
}

#[cfg(not(feature = "colors"))]
use color_shim::ColorizeShim as OwoColorize;

use crate::models::{DataSummary, Report, SummaryTables};
use crate::period::ReportPeriod;

const RULE_WIDTH: usize = 60;
const TOP_N: usize = 5;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

pub fn render_banner(title: &str, period: &ReportPeriod) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}", title.to_uppercase().bold());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Generating report for: {}", period.label);
    let _ = writeln!(
        out,
        "{}",
        format!(
            "Period: {} to {}",
            period.start.format("%Y-%m-%d %H:%M"),
            period.end.format("%Y-%m-%d %H:%M")
        )
        .bright_black()
    );
    out
}

/// Closing summary for either retrieval mode
pub fn render_run_summary(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}", "REPORT SUMMARY".bold());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Period: {}", report.report_metadata.report_period);

    if let Some(summary) = &report.summary {
        let ok = format!("Successful resources: {}", summary.successful_resources);
        let failed = format!("Failed resources: {}", summary.failed_resources);
        let _ = writeln!(out, "{}", ok.green());
        if summary.failed_resources > 0 {
            let _ = writeln!(out, "{}", failed.red());
        } else {
            let _ = writeln!(out, "{failed}");
        }
        let _ = writeln!(out, "Total data points: {}", summary.total_data_points);
    }

    if let Some(data) = &report.data_summary {
        let _ = writeln!(out, "Records: {}", data.total_records);
        let _ = writeln!(out, "Users: {}", data.unique_users);
        let _ = writeln!(out, "Projects: {}", data.unique_projects);
    }
    if let Some(section) = &report.usage_records {
        if section.truncated {
            let note = format!("Listing stopped at {} pages; results are partial", section.pages_fetched);
            let _ = writeln!(out, "{}", note.yellow());
        }
        if let Some(err) = &section.error {
            let _ = writeln!(out, "{}", format!("Listing error: {err}").red());
        }
    }

    let _ = writeln!(out, "Files created: {}", report.export_files.len());
    for file in &report.export_files {
        let _ = writeln!(out, "   - {file}");
    }
    out
}

/// Totals plus the top users, top projects and per-workload breakdown
pub fn render_insights(data: &DataSummary, tables: &SummaryTables) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "DATA INSIGHTS".bold());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Total Records: {}", data.total_records);
    let _ = writeln!(out, "Total CPU Hours: {:.1}", data.total_cpu_hours);
    let _ = writeln!(out, "Total GPU Hours: {:.1}", data.total_gpu_hours);
    let _ = writeln!(out, "Total Memory GB-Hours: {:.1}", data.total_memory_gb_hours);
    let _ = writeln!(out, "Unique Users: {}", data.unique_users);
    let _ = writeln!(out, "Unique Projects: {}", data.unique_projects);

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "--- Top 5 Users by CPU Hours ---".cyan());
    let _ = writeln!(
        out,
        "{:<24} {:>12} {:>10} {:>10}",
        "user", "cpu_hours", "workloads", "gpu_runs"
    );
    for u in tables.users.iter().take(TOP_N) {
        let _ = writeln!(
            out,
            "{:<24} {:>12.2} {:>10} {:>10}",
            truncate(&u.creator_username, 24),
            u.total_cpu_hours,
            u.total_workloads,
            u.gpu_workloads
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "--- Top 5 Projects by CPU Hours ---".cyan());
    let _ = writeln!(
        out,
        "{:<24} {:>12} {:>10} {:>10}",
        "project", "cpu_hours", "workloads", "users"
    );
    for p in tables.projects.iter().take(TOP_N) {
        let _ = writeln!(
            out,
            "{:<24} {:>12.2} {:>10} {:>10}",
            truncate(&p.project_name, 24),
            p.total_cpu_hours,
            p.total_workloads,
            p.unique_users
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "--- Usage by Workload Type ---".cyan());
    let _ = writeln!(
        out,
        "{:<16} {:>8} {:>12} {:>12} {:>12}",
        "workload_type", "runs", "cpu_hours", "gpu_hours", "avg_hours"
    );
    for w in &tables.workloads {
        let _ = writeln!(
            out,
            "{:<16} {:>8} {:>12.2} {:>12.2} {:>12.2}",
            truncate(&w.workload_type, 16),
            w.total_runs,
            w.total_cpu_hours,
            w.total_gpu_hours,
            w.avg_duration_hours
        );
    }
    out
}

pub fn render_outcome(success: bool, message: &str) -> String {
    if success {
        format!("\n{}\n", message.green().bold())
    } else {
        format!("\n{}\n", message.red().bold())
    }
}

/// Write rendered text; a closed or failing stdout is not an error for the run
pub fn emit<W: Write>(out: &mut W, text: &str) {
    let _ = out.write_all(text.as_bytes()).and_then(|()| out.flush());
}

fn emit_stdout(text: &str) {
    let stdout = io::stdout();
    emit(&mut stdout.lock(), text);
}

pub fn print_banner(title: &str, period: &ReportPeriod) {
    emit_stdout(&render_banner(title, period));
}

pub fn print_run_summary(report: &Report) {
    emit_stdout(&render_run_summary(report));
}

pub fn print_insights(data: &DataSummary, tables: &SummaryTables) {
    emit_stdout(&render_insights(data, tables));
}

pub fn print_outcome(success: bool, message: &str) {
    emit_stdout(&render_outcome(success, message));
}
