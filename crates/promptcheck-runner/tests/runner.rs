//! End-to-end executor tests against stub providers.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use promptcheck_core::{
    CaseType, ExpectedOutput, MetricConfig, MetricKind, ModelConfig, ModelParameters, RunConfig,
    TestCase,
};
use promptcheck_metrics::MetricRegistry;
use promptcheck_providers::{
    CompletionAttempt, CompletionRequest, ProviderClient, ProviderError, ProviderRegistry,
};
use promptcheck_runner::{execute_run, ProgressSink, RunOptions};

enum StubBehavior {
    /// Echo the prompt back as the response text.
    Echo,
    /// Rate-limit this many calls, then answer with the given text.
    FailTimes(u32, &'static str),
    AlwaysRateLimited,
}

struct StubProvider {
    behavior: StubBehavior,
    calls: AtomicU32,
}

impl StubProvider {
    fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionAttempt, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let ok = |text: String| {
            Ok(CompletionAttempt {
                text,
                tokens_prompt: Some(4),
                tokens_completion: Some(2),
                provider_cost: Some(0.001),
            })
        };
        match self.behavior {
            StubBehavior::Echo => ok(request.prompt.clone()),
            StubBehavior::FailTimes(failures, _) if call <= failures => {
                Err(ProviderError::RateLimit("slow down".into()))
            }
            StubBehavior::FailTimes(_, text) => ok(text.to_string()),
            StubBehavior::AlwaysRateLimited => Err(ProviderError::RateLimit("slow down".into())),
        }
    }
}

fn registry_with(behavior: StubBehavior) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new("stub");
    registry.insert("stub", Arc::new(StubProvider::new(behavior)));
    Arc::new(registry)
}

fn exact_match_case(id: &str, prompt: &str, expected: &str) -> TestCase {
    TestCase {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        tags: BTreeSet::new(),
        case_type: CaseType::LlmGeneration,
        prompt: prompt.to_string(),
        expected: ExpectedOutput {
            exact_match_string: Some(expected.to_string()),
            ..Default::default()
        },
        metric_configs: vec![MetricConfig {
            metric: MetricKind::ExactMatch,
            parameters: None,
            threshold: None,
        }],
        model_config: ModelConfig {
            provider: "stub".to_string(),
            model_name: "stub-model".to_string(),
            parameters: ModelParameters::default(),
        },
    }
}

fn with_retry_attempts(mut case: TestCase, retry_attempts: u32) -> TestCase {
    case.model_config.parameters.retry_attempts = Some(retry_attempts);
    case
}

fn fixtures() -> (Arc<RunConfig>, Arc<MetricRegistry>) {
    (
        Arc::new(RunConfig::default()),
        Arc::new(MetricRegistry::new()),
    )
}

#[tokio::test]
async fn results_preserve_input_order_at_any_concurrency() {
    for concurrency in [1, 2, 8] {
        let (config, metrics) = fixtures();
        let providers = registry_with(StubBehavior::Echo);
        let cases: Vec<TestCase> = (0..8)
            .map(|i| exact_match_case(&format!("case-{i}"), &format!("text-{i}"), &format!("text-{i}")))
            .collect();

        let report = execute_run(
            config,
            providers,
            metrics,
            cases,
            RunOptions {
                concurrency,
                fail_fast: false,
            },
            None,
        )
        .await
        .unwrap();

        let ids: Vec<&str> = report
            .test_results
            .iter()
            .map(|r| r.test_case_id.as_str())
            .collect();
        let expected: Vec<String> = (0..8).map(|i| format!("case-{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(report.summary.total, 8);
        assert_eq!(report.summary.passed, 8);
        assert_eq!(report.summary.failed, 0);
        assert!(report.all_passed());
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_to_success() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::FailTimes(2, "recovered"));
    let case = with_retry_attempts(exact_match_case("retry", "p", "recovered"), 2);

    let report = execute_run(
        config,
        providers,
        metrics,
        vec![case],
        RunOptions::default(),
        None,
    )
    .await
    .unwrap();

    let result = &report.test_results[0];
    assert!(result.overall_pass);
    let response = result.response.as_ref().unwrap();
    assert_eq!(response.raw_attempts, 3);
    assert_eq!(response.text, "recovered");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_yield_a_failed_result_with_placeholders() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::AlwaysRateLimited);
    let case = with_retry_attempts(exact_match_case("doomed", "p", "x"), 1);

    let report = execute_run(
        config,
        providers,
        metrics,
        vec![case],
        RunOptions::default(),
        None,
    )
    .await
    .unwrap();

    let result = &report.test_results[0];
    assert!(!result.overall_pass);
    assert!(result.response.is_none());
    assert!(result.error.as_ref().unwrap().contains("2 attempt"));
    assert_eq!(result.metric_results.len(), 1);
    let metric = &result.metric_results[0];
    assert_eq!(metric.pass, None);
    assert_eq!(metric.error.as_deref(), Some("provider call failed"));
    assert_eq!(report.summary.failed, 1);
}

#[tokio::test]
async fn unknown_provider_fails_only_its_own_case() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::Echo);
    let mut bad = exact_match_case("bad", "p", "p");
    bad.model_config.provider = "nope".to_string();
    let good = exact_match_case("good", "hello", "hello");

    let report = execute_run(
        config,
        providers,
        metrics,
        vec![bad, good],
        RunOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.test_results.len(), 2);
    let bad = &report.test_results[0];
    assert!(!bad.overall_pass);
    assert!(bad.error.as_ref().unwrap().contains("unknown provider 'nope'"));
    assert!(report.test_results[1].overall_pass);
    assert_eq!(report.summary.passed, 1);
    assert_eq!(report.summary.failed, 1);
}

#[tokio::test]
async fn fail_fast_skips_cases_not_yet_started() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::Echo);
    let cases = vec![
        exact_match_case("first", "actual", "expected-something-else"),
        exact_match_case("second", "p", "p"),
        exact_match_case("third", "p", "p"),
    ];

    let report = execute_run(
        config,
        providers,
        metrics,
        cases,
        RunOptions {
            concurrency: 1,
            fail_fast: true,
        },
        None,
    )
    .await
    .unwrap();

    // Every loaded case still has a result.
    assert_eq!(report.test_results.len(), 3);
    assert!(!report.test_results[0].overall_pass);
    for skipped in &report.test_results[1..] {
        assert!(!skipped.overall_pass);
        assert!(skipped.error.as_ref().unwrap().contains("not executed"));
        assert!(skipped.response.is_none());
    }
    assert_eq!(report.summary.failed, 3);
}

#[tokio::test]
async fn progress_sink_sees_every_case() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::Echo);
    let cases: Vec<TestCase> = (0..5)
        .map(|i| exact_match_case(&format!("c{i}"), "p", "p"))
        .collect();

    let ticks = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));
    let sink: ProgressSink = {
        let ticks = Arc::clone(&ticks);
        let high_water = Arc::clone(&high_water);
        Arc::new(move |done, total| {
            assert_eq!(total, 5);
            ticks.fetch_add(1, Ordering::SeqCst);
            high_water.fetch_max(done, Ordering::SeqCst);
        })
    };

    execute_run(
        config,
        providers,
        metrics,
        cases,
        RunOptions::default(),
        Some(sink),
    )
    .await
    .unwrap();

    assert_eq!(ticks.load(Ordering::SeqCst), 5);
    assert_eq!(high_water.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn nonpositive_timeout_never_aborts_the_run() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::Echo);
    let mut case = exact_match_case("bad-timeout", "p", "p");
    case.model_config.parameters.timeout_s = Some(-1.0);

    let report = execute_run(
        config,
        providers,
        metrics,
        vec![case],
        RunOptions::default(),
        None,
    )
    .await
    .unwrap();

    // The timeout falls back to the default; the case still runs and has
    // a result.
    assert_eq!(report.test_results.len(), 1);
    assert!(report.test_results[0].overall_pass);
}

#[tokio::test]
async fn observational_only_case_passes_vacuously() {
    let (config, metrics) = fixtures();
    let providers = registry_with(StubBehavior::Echo);
    let mut case = exact_match_case("obs", "p", "p");
    case.metric_configs = vec![MetricConfig {
        metric: MetricKind::Latency,
        parameters: None,
        threshold: None,
    }];

    let report = execute_run(
        config,
        providers,
        metrics,
        vec![case],
        RunOptions::default(),
        None,
    )
    .await
    .unwrap();

    let result = &report.test_results[0];
    assert!(result.overall_pass);
    assert_eq!(result.metric_results[0].pass, None);
}
