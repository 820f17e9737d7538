//! The run executor: a bounded worker pool over test cases.
//!
//! All tasks are spawned up front; each acquires a semaphore permit before
//! doing work, so the permit count bounds in-flight provider calls. Under
//! fail-fast a shared stop flag keeps not-yet-started cases from running
//! while in-flight ones finish. Results are collected by input index, so
//! report order always equals input order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use promptcheck_core::{
    MetricResult, RunConfig, RunReport, RunSummary, TestCase, TestResult,
};
use promptcheck_metrics::{unexecuted, MetricRegistry};
use promptcheck_providers::{
    complete_with_retry, CompletionRequest, ProviderRegistry, RetryPolicy,
};

/// How a run executes. Defaults match CI use: modest parallelism, every
/// case runs to completion.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum provider calls in flight at once.
    pub concurrency: usize,
    /// Stop scheduling new cases after the first failed one.
    pub fail_fast: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fail_fast: false,
        }
    }
}

/// Called after each case completes with (completed, total).
pub type ProgressSink = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Execute every test case and aggregate the outcomes into a report.
///
/// The report contains exactly one result per input case, in input order.
/// Case-level failures (provider errors, failed metrics, fail-fast skips)
/// are recorded in their results; `Err` is reserved for executor faults.
pub async fn execute_run(
    config: Arc<RunConfig>,
    providers: Arc<ProviderRegistry>,
    metrics: Arc<MetricRegistry>,
    cases: Vec<TestCase>,
    options: RunOptions,
    progress: Option<ProgressSink>,
) -> anyhow::Result<RunReport> {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let run_started = Instant::now();
    let total = cases.len();

    info!(run_id = %run_id, total, concurrency = options.concurrency, "starting run");

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let stop = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut workers = JoinSet::new();
    for (index, case) in cases.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let providers = Arc::clone(&providers);
        let metrics = Arc::clone(&metrics);
        let semaphore = Arc::clone(&semaphore);
        let stop = Arc::clone(&stop);
        let completed = Arc::clone(&completed);
        let progress = progress.clone();
        let fail_fast = options.fail_fast;

        workers.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Err(_) => skipped_result(&case, "not executed: executor shut down"),
                Ok(_permit) => {
                    if stop.load(Ordering::SeqCst) {
                        skipped_result(&case, "not executed: fail-fast stop after earlier failure")
                    } else {
                        let result = run_case(&config, &providers, &metrics, &case).await;
                        if fail_fast && !result.overall_pass {
                            stop.store(true, Ordering::SeqCst);
                        }
                        result
                    }
                }
            };
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &progress {
                progress(done, total);
            }
            (index, result)
        });
    }

    let mut slots: Vec<Option<TestResult>> = (0..total).map(|_| None).collect();
    while let Some(joined) = workers.join_next().await {
        let (index, result) = joined.context("test case worker panicked")?;
        slots[index] = Some(result);
    }

    let mut test_results = Vec::with_capacity(total);
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(result) => test_results.push(result),
            None => bail!("no result produced for test case at index {index}"),
        }
    }

    let summary = summarize(&test_results, run_started.elapsed().as_millis() as u64);
    info!(
        run_id = %run_id,
        passed = summary.passed,
        failed = summary.failed,
        duration_ms = summary.duration_ms,
        "run finished"
    );

    Ok(RunReport {
        run_id,
        started_at,
        test_results,
        summary,
    })
}

/// Run one case: resolve the model, call the provider under retry policy,
/// evaluate every configured metric. Never fails the run.
async fn run_case(
    config: &RunConfig,
    providers: &ProviderRegistry,
    metrics: &MetricRegistry,
    case: &TestCase,
) -> TestResult {
    let model = config.resolve_model(&case.model_config);

    let Some(client) = providers.get(&model.provider) else {
        warn!(case = %case.id, provider = %model.provider, "unknown provider");
        return failed_result(
            case,
            format!(
                "unknown provider '{}' (available: {})",
                model.provider,
                providers.provider_names().join(", ")
            ),
        );
    };

    let request = CompletionRequest::new(case.prompt.clone(), &model);
    let policy =
        RetryPolicy::with_retry_attempts(config.effective_retry_attempts(&model.parameters));
    let timeout = Duration::from_secs_f64(config.effective_timeout_s(&model.parameters));

    match complete_with_retry(client.as_ref(), &request, &policy, timeout).await {
        Ok(response) => {
            let metric_results: Vec<MetricResult> = case
                .metric_configs
                .iter()
                .map(|metric_config| metrics.evaluate(metric_config, case, &response))
                .collect();
            // Observational metrics (pass = None) never affect the verdict;
            // a case with only observational metrics passes vacuously.
            let overall_pass = metric_results
                .iter()
                .filter_map(|result| result.pass)
                .all(|pass| pass);
            TestResult {
                test_case_id: case.id.clone(),
                test_case_name: case.name.clone(),
                response: Some(response),
                metric_results,
                overall_pass,
                error: None,
            }
        }
        Err(failure) => failed_result(case, failure.to_string()),
    }
}

fn placeholder_metrics(case: &TestCase, reason: &str) -> Vec<MetricResult> {
    case.metric_configs
        .iter()
        .map(|metric_config| unexecuted(metric_config, reason))
        .collect()
}

fn failed_result(case: &TestCase, error: String) -> TestResult {
    TestResult {
        test_case_id: case.id.clone(),
        test_case_name: case.name.clone(),
        response: None,
        metric_results: placeholder_metrics(case, "provider call failed"),
        overall_pass: false,
        error: Some(error),
    }
}

fn skipped_result(case: &TestCase, reason: &str) -> TestResult {
    TestResult {
        test_case_id: case.id.clone(),
        test_case_name: case.name.clone(),
        response: None,
        metric_results: placeholder_metrics(case, reason),
        overall_pass: false,
        error: Some(reason.to_string()),
    }
}

fn summarize(results: &[TestResult], duration_ms: u64) -> RunSummary {
    let passed = results.iter().filter(|r| r.overall_pass).count();
    let total_cost = results
        .iter()
        .filter_map(|r| r.response.as_ref())
        .map(|resp| resp.cost)
        .sum();
    let total_tokens = results
        .iter()
        .filter_map(|r| r.response.as_ref())
        .filter_map(|resp| resp.tokens_total())
        .map(u64::from)
        .sum();
    RunSummary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        total_cost,
        total_tokens,
        duration_ms,
    }
}

/// Process exit code for a finished run. Soft-fail reports failures in
/// the artifact but keeps the build green.
pub fn exit_code(report: &RunReport, soft_fail: bool) -> i32 {
    if soft_fail || report.all_passed() {
        0
    } else {
        1
    }
}
