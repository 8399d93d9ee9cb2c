use std::process::{Command, Output};
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "USAGE_REPORT_MODE",
    "USAGE_REPORT_FILTER",
    "USAGE_REPORT_API_URL",
    "USAGE_REPORT_API_KEY",
    "USAGE_REPORT_OUTPUT_DIR",
    "USAGE_REPORT_WEBHOOK_URL",
    "USAGE_REPORT_CONFIG",
    "CDSW_APIV2_KEY",
];

/// Runs the binary with a scratch home so no real config file or webhook is picked up
fn run(args: &[&str]) -> Output {
    let home = TempDir::new().unwrap();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_usage-report"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("USAGE_REPORT_OUTPUT_DIR", home.path().join("reports"))
        .args(args)
        .output()
        .unwrap()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn wrong_argument_count_exits_one_with_usage() {
    let out = run(&["2024"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Usage:"));
}

#[test]
fn non_numeric_arguments_exit_one_with_usage() {
    for args in [&["july", "2024"][..], &["2024", "7", "x"], &["2024", "-1"]] {
        let out = run(args);
        assert_eq!(out.status.code(), Some(1), "args {args:?}");
        assert!(stderr(&out).contains("Usage:"), "args {args:?}");
    }
}

#[test]
fn invalid_date_exits_one() {
    let out = run(&["2024", "2", "30"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("FATAL ERROR"));
}

#[test]
fn help_exits_zero() {
    let out = run(&["--help"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Usage:"));
}
