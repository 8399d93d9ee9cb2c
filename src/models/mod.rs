pub mod record;
pub mod report;
pub mod series;
pub mod summary;

pub use record::{DetailedRow, MemoryDivisor, UsageRecord};
pub use report::{
    ProcessingSummary, RecordSection, Report, ReportMetadata, ResourceUsage, RunSummary,
};
pub use series::{ResourceKind, SeriesStats, TimeSeriesPoint};
pub use summary::{
    DataSummary, ProjectSummary, StatusSummary, SummaryTables, UserSummary, WorkloadSummary,
};
