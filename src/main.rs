use anyhow::{Context, Result};
use chrono::Local;
use std::process;
use tracing::error;

use usage_report::api::HttpUsageApi;
use usage_report::cli::Args;
use usage_report::config::{ReportConfig, fallback_timeout, fallback_webhook_url, load_for_args};
use usage_report::display::print_outcome;
use usage_report::logging::init_logging;
use usage_report::notify::{Notifier, notifier_for};
use usage_report::period::ReportPeriod;
use usage_report::pipeline::{CRITICAL_SUBJECT, EXIT_FAILURE, EXIT_OK, ReportRunner};

fn build_notifier(config: &ReportConfig) -> Box<dyn Notifier> {
    notifier_for(config.webhook_url.as_deref(), config.timeout)
}

/// `critical` is upgraded as configuration resolves so fatal errors reach the
/// best channel known at the time they happen
fn run(args: &Args, critical: &mut Option<Box<dyn Notifier>>) -> Result<i32> {
    let range = match args.range_strategy() {
        Ok(range) => range,
        Err(complaint) => {
            eprintln!("{complaint}\n");
            eprintln!("{}", Args::usage_help());
            return Ok(EXIT_FAILURE);
        }
    };

    let file = load_for_args(args).context("load config file")?;
    *critical = Some(notifier_for(
        fallback_webhook_url(args, Some(&file)).as_deref(),
        fallback_timeout(args, Some(&file)),
    ));
    let config = ReportConfig::resolve(args, file, range).context("resolve configuration")?;
    *critical = Some(build_notifier(&config));

    let now = Local::now().naive_local();
    let period = ReportPeriod::resolve(range, now).context("resolve report period")?;
    let api_url = config.require_api_url()?;

    let api = HttpUsageApi::new(api_url, config.api_key.clone(), config.timeout);
    let notifier = build_notifier(&config);
    let outcome = ReportRunner::new(&config, &api, notifier.as_ref()).run(&period, now);
    Ok(outcome.exit_code)
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            if Args::is_informational(&e) {
                process::exit(EXIT_OK);
            }
            eprintln!("\n{}", Args::usage_help());
            process::exit(EXIT_FAILURE);
        }
    };
    init_logging(args.log_json);

    let mut critical = None;
    let code = match run(&args, &mut critical) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal error");
            print_outcome(false, &format!("FATAL ERROR: {e:#}"));
            let body = format!("Usage report FATAL ERROR: {e:#}");
            let notifier = critical.unwrap_or_else(|| {
                notifier_for(fallback_webhook_url(&args, None).as_deref(), fallback_timeout(&args, None))
            });
            if let Err(notify_err) = notifier.send(CRITICAL_SUBJECT, &body) {
                error!(error = %notify_err, "critical notification failed");
            }
            EXIT_FAILURE
        }
    };
    process::exit(code);
}
