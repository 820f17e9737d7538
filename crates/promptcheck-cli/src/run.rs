//! The `run` subcommand: load, execute, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use promptcheck_core::{MetricValue, RunConfig, RunReport, TestResult};
use promptcheck_metrics::MetricRegistry;
use promptcheck_providers::ProviderRegistry;
use promptcheck_runner::{execute_run, exit_code, ProgressSink, RunOptions};

#[derive(Args)]
pub struct RunArgs {
    /// Test files or directories to load (directories are scanned for
    /// .yaml/.yml files).
    #[arg(default_value = "./tests")]
    pub paths: Vec<PathBuf>,

    /// Directory containing promptcheck.config.yaml.
    #[arg(short, long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Directory the JSON report artifact is written to.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum provider calls in flight at once.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Stop scheduling new test cases after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Always exit 0; failures still show in the report and summary.
    #[arg(long)]
    pub soft_fail: bool,

    /// Only run cases carrying at least one of these tags.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<i32> {
    let config = match RunConfig::load(&args.config_dir) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("config error: {err}");
            return Ok(2);
        }
    };

    let cases = match promptcheck_suite::load(&args.paths) {
        Ok(cases) => cases,
        Err(load_error) => {
            eprintln!("suite validation failed:");
            for issue in &load_error.issues {
                eprintln!("  {issue}");
            }
            return Ok(2);
        }
    };
    if cases.is_empty() {
        eprintln!("no test cases found under the given paths");
        return Ok(2);
    }

    let cases = promptcheck_suite::filter_by_tags(cases, &args.tags);
    if cases.is_empty() {
        warn!(tags = ?args.tags, "tag filter matched no test cases");
        println!("0 test cases matched the tag filter; nothing to run");
        return Ok(0);
    }

    let providers = Arc::new(ProviderRegistry::from_config(&config));
    let metrics = Arc::new(MetricRegistry::new());

    let bar = ProgressBar::new(cases.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let sink: ProgressSink = {
        let bar = bar.clone();
        Arc::new(move |done, _total| bar.set_position(done as u64))
    };

    let report = execute_run(
        config,
        providers,
        metrics,
        cases,
        RunOptions {
            concurrency: args.concurrency,
            fail_fast: args.fail_fast,
        },
        Some(sink),
    )
    .await?;
    bar.finish_and_clear();

    let report_path = write_report(&args.output_dir, &report)?;
    info!(path = %report_path.display(), "report written");

    print_summary(&report, &report_path);
    Ok(exit_code(&report, args.soft_fail))
}

/// Write the report artifact as pretty JSON, named after the run start
/// time: `promptcheck_run_YYYYMMDD_HHMMSS.json`.
fn write_report(output_dir: &Path, report: &RunReport) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let filename = format!(
        "promptcheck_run_{}.json",
        report.started_at.format("%Y%m%d_%H%M%S")
    );
    let path = output_dir.join(filename);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("writing report to {}", path.display()))?;
    Ok(path)
}

/// Human summary on stdout. Derived entirely from the report so the
/// console and the artifact can never disagree.
fn print_summary(report: &RunReport, report_path: &Path) {
    println!();
    for result in &report.test_results {
        println!("{} {}", verdict(result), result.test_case_name);
        if let Some(error) = &result.error {
            println!("       {error}");
            continue;
        }
        for metric in &result.metric_results {
            let value = match metric.value {
                MetricValue::Bool(b) => b.to_string(),
                MetricValue::Number(n) => format!("{n:.4}"),
                MetricValue::Null => "null".to_string(),
            };
            let status = match metric.pass {
                Some(true) => "pass",
                Some(false) => "FAIL",
                None => "info",
            };
            println!("       {status}  {} = {value}", metric.metric);
        }
    }

    let summary = &report.summary;
    println!();
    println!(
        "{} passed, {} failed of {} ({} ms, {} tokens, ${:.4})",
        summary.passed,
        summary.failed,
        summary.total,
        summary.duration_ms,
        summary.total_tokens,
        summary.total_cost
    );
    println!("report: {}", report_path.display());
}

fn verdict(result: &TestResult) -> &'static str {
    if result.overall_pass {
        "PASS "
    } else {
        "FAIL "
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use promptcheck_core::RunSummary;

    use super::*;

    #[test]
    fn report_filename_uses_run_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport {
            run_id: "r".into(),
            started_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            test_results: vec![],
            summary: RunSummary::default(),
        };
        let path = write_report(dir.path(), &report).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "promptcheck_run_20260314_092653.json"
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: RunReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, report);
    }
}
