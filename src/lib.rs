//! # Usage Report
//!
//! Batch reporting over a platform usage API: resolve a reporting window,
//! fetch usage either as per-resource time series or as paginated workload
//! records, normalize it, aggregate it and export CSV/JSON files.
//!
//! ## Overview
//!
//! A run produces:
//! - One CSV per resource series plus a combined pivot (time-series mode)
//! - A detailed record CSV plus user/project/workload/status summaries (records mode)
//! - A JSON report envelope, written even when the run fails
//! - One final notification and a process exit code
//!
//! ## Features
//!
//! - `colors` (default): Enables terminal color output via owo-colors

/// Grouped summaries and run-wide totals over normalized records
pub mod aggregate;

/// Usage API client trait and HTTP implementation
pub mod api;

/// Command-line argument parsing
pub mod cli;

/// Layered configuration: CLI/env, TOML file, defaults
pub mod config;

/// Console rendering of banners, summaries and insights
pub mod display;

/// Typed error enums per layer
pub mod error;

/// CSV and JSON writers
pub mod export;

/// Time-series and paginated listing retrieval
pub mod fetch;

/// tracing subscriber setup
pub mod logging;

/// Report data models
pub mod models;

/// Coercion of loosely typed API payloads
pub mod normalize;

/// Notification channels
pub mod notify;

/// Reporting window resolution
pub mod period;

/// End-to-end run orchestration
pub mod pipeline;
