//! Process-wide `tracing` subscriber for the binary.

use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "USAGE_REPORT_LOG";
pub const DEFAULT_LEVEL: &str = "info";

/// Filter directives from `USAGE_REPORT_LOG`, then `RUST_LOG`, then `info`
pub fn filter_directives() -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

/// Install the subscriber. Logs go to stderr so stdout stays free for the
/// run summary. Calling twice is harmless.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_new(filter_directives())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
}
