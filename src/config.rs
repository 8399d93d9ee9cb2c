//! # Config Module
//!
//! Merges command-line/env settings over an optional TOML file over built-in
//! defaults into one `ReportConfig`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;
use crate::error::ConfigError;
use crate::export::{DEFAULT_FILE_PREFIX, DEFAULT_OUTPUT_DIR, RECORDS_FILE_PREFIX};
use crate::fetch::{FilterMode, ListingOptions, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::models::{MemoryDivisor, ResourceKind};
use crate::period::RangeStrategy;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const LEGACY_API_KEY_ENV: &str = "CDSW_APIV2_KEY";

/// Which upstream endpoint feeds the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Timeseries,
    Records,
}

impl FetchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::Timeseries => "timeseries",
            FetchMode::Records => "records",
        }
    }

    /// Name of the API operation, recorded in the report metadata
    pub fn api_method(self) -> &'static str {
        match self {
            FetchMode::Timeseries => "get_time_series",
            FetchMode::Records => "list_usage",
        }
    }
}

/// Settings read from the TOML config file; every key is optional
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub mode: Option<FetchMode>,
    pub filter: Option<FilterMode>,
    pub page_size: Option<u32>,
    pub max_pages: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub resources: Option<Vec<String>>,
    pub memory_divisor: Option<MemoryDivisor>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub mode: FetchMode,
    pub range: RangeStrategy,
    pub listing: ListingOptions,
    pub resources: Vec<ResourceKind>,
    pub memory_divisor: MemoryDivisor,
    pub timeout: Duration,
    pub webhook_url: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            api_url: None,
            api_key: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            mode: FetchMode::Timeseries,
            range: RangeStrategy::MonthToDate,
            listing: ListingOptions::default(),
            resources: ResourceKind::ALL.to_vec(),
            memory_divisor: MemoryDivisor::Gib,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            webhook_url: None,
        }
    }
}

/// `<config dir>/usage-report/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "usage-report")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// An explicit path must exist; the default location is optional
pub fn load_for_args(args: &Args) -> Result<FileConfig, ConfigError> {
    if let Some(path) = &args.config {
        return load_file_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_resources(names: &[String]) -> Result<Vec<ResourceKind>, ConfigError> {
    let mut out = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let kind: ResourceKind = name.parse()?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    Ok(out)
}

/// Webhook for fatal-error alerts raised before a `ReportConfig` exists;
/// the command line wins over the config file
pub fn fallback_webhook_url(args: &Args, file: Option<&FileConfig>) -> Option<String> {
    non_empty(args.webhook_url.clone())
        .or_else(|| file.and_then(|f| non_empty(f.webhook_url.clone())))
}

/// Timeout for fatal-error alerts raised before a `ReportConfig` exists
pub fn fallback_timeout(args: &Args, file: Option<&FileConfig>) -> Duration {
    let secs = args
        .timeout_secs
        .or_else(|| file.and_then(|f| f.timeout_secs))
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

impl ReportConfig {
    pub fn resolve(
        args: &Args,
        file: FileConfig,
        range: RangeStrategy,
    ) -> Result<Self, ConfigError> {
        let defaults = ReportConfig::default();

        let resources = if !args.resources.is_empty() {
            parse_resources(&args.resources)?
        } else if let Some(names) = &file.resources {
            parse_resources(names)?
        } else {
            defaults.resources
        };

        let page_size = args.page_size.or(file.page_size).unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ConfigError::NonPositive("page_size"));
        }
        let max_pages = args.max_pages.or(file.max_pages).unwrap_or(DEFAULT_MAX_PAGES);
        if max_pages == 0 {
            return Err(ConfigError::NonPositive("max_pages"));
        }
        let timeout_secs = args
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::NonPositive("timeout_secs"));
        }

        let mode = args.mode.map(FetchMode::from).or(file.mode).unwrap_or_default();
        let default_prefix = match mode {
            FetchMode::Timeseries => defaults.file_prefix,
            FetchMode::Records => RECORDS_FILE_PREFIX.to_string(),
        };

        Ok(ReportConfig {
            api_url: non_empty(args.api_url.clone()).or(non_empty(file.api_url)),
            api_key: non_empty(args.api_key.clone())
                .or(non_empty(file.api_key))
                .or_else(|| non_empty(env::var(LEGACY_API_KEY_ENV).ok())),
            output_dir: args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or(defaults.output_dir),
            file_prefix: non_empty(args.file_prefix.clone())
                .or(non_empty(file.file_prefix))
                .unwrap_or(default_prefix),
            mode,
            range,
            listing: ListingOptions {
                page_size,
                max_pages,
                filter: args
                    .filter
                    .map(FilterMode::from)
                    .or(file.filter)
                    .unwrap_or_default(),
            },
            resources,
            memory_divisor: args
                .memory_divisor
                .map(MemoryDivisor::from)
                .or(file.memory_divisor)
                .unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
            webhook_url: non_empty(args.webhook_url.clone()).or(non_empty(file.webhook_url)),
        })
    }

    pub fn require_api_url(&self) -> Result<&str, ConfigError> {
        self.api_url.as_deref().ok_or(ConfigError::MissingApiUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Args {
        let mut full = vec!["usage-report"];
        full.extend_from_slice(extra);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    #[serial]
    fn test_defaults() {
        // SAFETY: Test runs serially, no concurrent env access
        unsafe { env::remove_var(LEGACY_API_KEY_ENV) };
        let cfg = ReportConfig::resolve(&args(&[]), FileConfig::default(), RangeStrategy::MonthToDate)
            .unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("reports"));
        assert_eq!(cfg.mode, FetchMode::Timeseries);
        assert_eq!(cfg.listing, ListingOptions::default());
        assert_eq!(cfg.resources, ResourceKind::ALL.to_vec());
        assert_eq!(cfg.memory_divisor, MemoryDivisor::Gib);
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.file_prefix, "usage");
        assert!(matches!(cfg.require_api_url(), Err(ConfigError::MissingApiUrl)));
    }

    #[test]
    fn test_file_then_cli_precedence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
api_url = "https://file.example.com"
output_dir = "/tmp/from-file"
mode = "records"
filter = "client"
page_size = 250
resources = ["gpu", "cpu"]
memory_divisor = "kib"
"#,
        )
        .unwrap();
        let file = load_file_config(&path).unwrap();

        let cfg = ReportConfig::resolve(
            &args(&["--output-dir", "/tmp/from-cli", "--page-size", "50"]),
            file,
            RangeStrategy::LastMonth,
        )
        .unwrap();
        assert_eq!(cfg.api_url.as_deref(), Some("https://file.example.com"));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/from-cli"));
        assert_eq!(cfg.mode, FetchMode::Records);
        assert_eq!(cfg.listing.filter, FilterMode::Client);
        assert_eq!(cfg.listing.page_size, 50);
        assert_eq!(cfg.resources, vec![ResourceKind::Gpu, ResourceKind::Cpu]);
        assert_eq!(cfg.memory_divisor, MemoryDivisor::Kib);
        assert_eq!(cfg.range, RangeStrategy::LastMonth);
        assert_eq!(cfg.file_prefix, "enhanced");
    }

    #[test]
    #[serial]
    fn test_file_webhook_reaches_fatal_alerts() {
        let file = FileConfig {
            webhook_url: Some("https://chat.example.com/hook".into()),
            timeout_secs: Some(5),
            ..FileConfig::default()
        };
        assert_eq!(
            fallback_webhook_url(&args(&[]), Some(&file)).as_deref(),
            Some("https://chat.example.com/hook")
        );
        assert_eq!(fallback_timeout(&args(&[]), Some(&file)), Duration::from_secs(5));
        assert_eq!(
            fallback_webhook_url(&args(&["--webhook-url", "https://cli.example.com"]), Some(&file))
                .as_deref(),
            Some("https://cli.example.com")
        );
        assert_eq!(fallback_webhook_url(&args(&[]), None), None);

        // Resolution succeeds without an API URL, so the caller can still alert via the file webhook
        let cfg = ReportConfig::resolve(&args(&[]), file, RangeStrategy::MonthToDate).unwrap();
        assert!(matches!(cfg.require_api_url(), Err(ConfigError::MissingApiUrl)));
        assert_eq!(cfg.webhook_url.as_deref(), Some("https://chat.example.com/hook"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(matches!(load_file_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_rejects_zero_and_unknown_resource() {
        let err = ReportConfig::resolve(
            &args(&["--max-pages", "0"]),
            FileConfig::default(),
            RangeStrategy::MonthToDate,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive("max_pages")));

        let err = ReportConfig::resolve(
            &args(&["--resources", "cpu,disk"]),
            FileConfig::default(),
            RangeStrategy::MonthToDate,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownResource(_)));
    }

    #[test]
    #[serial]
    fn test_legacy_api_key_env() {
        // SAFETY: Test runs serially, no concurrent env access
        unsafe { env::set_var(LEGACY_API_KEY_ENV, "legacy-token") };
        let cfg = ReportConfig::resolve(&args(&[]), FileConfig::default(), RangeStrategy::MonthToDate)
            .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("legacy-token"));

        let cfg = ReportConfig::resolve(
            &args(&["--api-key", "explicit"]),
            FileConfig::default(),
            RangeStrategy::MonthToDate,
        )
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("explicit"));
        unsafe { env::remove_var(LEGACY_API_KEY_ENV) };
    }
}
