use std::path::PathBuf;

use crate::config::FetchMode;
use crate::fetch::FilterMode;
use crate::models::MemoryDivisor;
use crate::period::RangeStrategy;

const USAGE_EXAMPLES: &str = "\
Examples:
  usage-report                 Current month to date
  usage-report 2024 7          Full July 2024
  usage-report 2024 7 15       July 1-15, 2024
  usage-report --last-month    Previous calendar month (scheduled run)";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Per-resource counts from the time-series endpoint
    Timeseries,
    /// Per-workload records from the paginated usage listing
    Records,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterArg {
    /// Let the API filter by creation time
    Server,
    /// Filter records locally after fetching
    Client,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnitArg {
    /// Memory field is bytes (divide by 1024^3)
    Gib,
    /// Divide by 1024 only (older report behaviour)
    Kib,
}

impl From<ModeArg> for FetchMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Timeseries => FetchMode::Timeseries,
            ModeArg::Records => FetchMode::Records,
        }
    }
}

impl From<FilterArg> for FilterMode {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::Server => FilterMode::Server,
            FilterArg::Client => FilterMode::Client,
        }
    }
}

impl From<MemoryUnitArg> for MemoryDivisor {
    fn from(value: MemoryUnitArg) -> Self {
        match value {
            MemoryUnitArg::Gib => MemoryDivisor::Gib,
            MemoryUnitArg::Kib => MemoryDivisor::Kib,
        }
    }
}

#[derive(clap::Parser, Debug)]
#[command(
    name = "usage-report",
    version,
    about = "Collect platform usage for a period and export CSV/JSON reports",
    after_help = USAGE_EXAMPLES
)]
pub struct Args {
    /// YEAR MONTH [END_DAY]; omit for month to date
    #[arg(value_name = "YEAR MONTH [END_DAY]")]
    pub period: Vec<u32>,

    /// Report the previous calendar month (for monthly schedules)
    #[arg(long, conflicts_with = "period")]
    pub last_month: bool,

    /// Retrieval mode: timeseries|records
    #[arg(long, value_enum, env = "USAGE_REPORT_MODE")]
    pub mode: Option<ModeArg>,

    /// Creation-time filtering for records mode: server|client
    #[arg(long, value_enum, env = "USAGE_REPORT_FILTER")]
    pub filter: Option<FilterArg>,

    /// Base URL of the usage API
    #[arg(long, env = "USAGE_REPORT_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the usage API (falls back to CDSW_APIV2_KEY)
    #[arg(long, env = "USAGE_REPORT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory that receives CSV and JSON files (default: reports)
    #[arg(long, env = "USAGE_REPORT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Prefix for every exported filename (default: usage)
    #[arg(long)]
    pub file_prefix: Option<String>,

    /// Records per page in records mode
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Stop paginating after this many pages and keep partial results
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Resource dimensions for timeseries mode, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub resources: Vec<String>,

    /// How raw memory converts to GB: gib|kib
    #[arg(long, value_enum)]
    pub memory_divisor: Option<MemoryUnitArg>,

    /// Chat webhook that also receives the final notification
    #[arg(long, env = "USAGE_REPORT_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// TOML config file (default: <config dir>/usage-report/config.toml)
    #[arg(long, env = "USAGE_REPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// Hands clap's error back instead of exiting with status 2
    pub fn try_parse() -> Result<Self, clap::Error> {
        <Args as clap::Parser>::try_parse()
    }

    /// Help and version requests are not failures
    pub fn is_informational(err: &clap::Error) -> bool {
        matches!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
        )
    }

    /// Map positionals and flags to a range strategy; `Err` carries the
    /// usage complaint for anything other than 0, 2 or 3 positionals
    pub fn range_strategy(&self) -> Result<RangeStrategy, String> {
        if self.last_month {
            return Ok(RangeStrategy::LastMonth);
        }
        let year = |v: u32| i32::try_from(v).map_err(|_| format!("year {v} is out of range"));
        match self.period.as_slice() {
            [] => Ok(RangeStrategy::MonthToDate),
            [y, m] => Ok(RangeStrategy::FullMonth {
                year: year(*y)?,
                month: *m,
            }),
            [y, m, d] => Ok(RangeStrategy::PartialMonth {
                year: year(*y)?,
                month: *m,
                end_day: *d,
            }),
            other => Err(format!(
                "expected 0, 2 or 3 positional arguments, got {}",
                other.len()
            )),
        }
    }

    pub fn usage_help() -> String {
        <Args as clap::CommandFactory>::command()
            .render_help()
            .to_string()
    }
}
