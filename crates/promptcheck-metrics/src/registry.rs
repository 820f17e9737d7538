//! Metric dispatch and threshold evaluation.
//!
//! `evaluate` never panics and never returns `Err`: unsupported metrics
//! and computation failures become failed results with a null value, so
//! one bad metric cannot take down a run.

use std::collections::BTreeSet;

use promptcheck_core::{
    MetricConfig, MetricKind, MetricResult, MetricValue, ProviderResponse, TestCase,
};

use crate::error::MetricError;
use crate::{overlap, text, usage};

/// A raw metric value plus optional metric-specific details, before
/// threshold evaluation.
#[derive(Debug)]
pub(crate) struct Computed {
    pub value: MetricValue,
    pub details: Option<serde_json::Value>,
}

impl Computed {
    pub(crate) fn value(value: MetricValue) -> Self {
        Self {
            value,
            details: None,
        }
    }
}

/// The set of metrics this build can compute.
pub struct MetricRegistry {
    supported: BTreeSet<MetricKind>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        let mut supported = BTreeSet::from([
            MetricKind::ExactMatch,
            MetricKind::RegexMatch,
            MetricKind::RougeL,
            MetricKind::TokenCount,
            MetricKind::Latency,
            MetricKind::Cost,
        ]);
        #[cfg(feature = "bleu")]
        supported.insert(MetricKind::Bleu);
        Self { supported }
    }

    /// Registry restricted to the given kinds. Lets callers and tests
    /// model a build without an optional metric.
    pub fn with_kinds(kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        Self {
            supported: kinds.into_iter().collect(),
        }
    }

    pub fn supports(&self, kind: MetricKind) -> bool {
        self.supported.contains(&kind)
    }

    /// Evaluate one configured metric against a successful response.
    pub fn evaluate(
        &self,
        config: &MetricConfig,
        case: &TestCase,
        response: &ProviderResponse,
    ) -> MetricResult {
        if !self.supports(config.metric) {
            return failed(config, MetricError::Unsupported(config.metric));
        }

        let computed = match config.metric {
            MetricKind::ExactMatch => text::exact_match(case, response),
            MetricKind::RegexMatch => text::regex_match(case, response),
            MetricKind::RougeL => overlap::rouge_l(case, response),
            #[cfg(feature = "bleu")]
            MetricKind::Bleu => overlap::bleu(case, response),
            #[cfg(not(feature = "bleu"))]
            MetricKind::Bleu => Err(MetricError::Unsupported(MetricKind::Bleu)),
            MetricKind::TokenCount => usage::token_count(config, response),
            MetricKind::Latency => usage::latency(response),
            MetricKind::Cost => usage::cost(response),
        };

        match computed {
            Ok(computed) => {
                let pass = evaluate_pass(config, computed.value);
                MetricResult {
                    metric: config.metric,
                    value: computed.value,
                    pass,
                    threshold_used: config.threshold,
                    details: computed.details,
                    error: None,
                }
            }
            Err(error) => failed(config, error),
        }
    }
}

/// Pass verdict for a successfully computed value.
///
/// With a threshold the operator decides. Without one, boolean metrics
/// pass on `true`; numeric metrics are observational (`None`).
fn evaluate_pass(config: &MetricConfig, value: MetricValue) -> Option<bool> {
    match (config.threshold, value.as_f64()) {
        (Some(threshold), Some(v)) => Some(threshold.operator.compare(v, threshold.value)),
        (Some(_), None) => Some(false),
        (None, _) => match value {
            MetricValue::Bool(b) => Some(b),
            _ => None,
        },
    }
}

/// Failed result shape shared by unsupported metrics and computation
/// errors: null value, explicit failure, error message attached.
fn failed(config: &MetricConfig, error: MetricError) -> MetricResult {
    MetricResult {
        metric: config.metric,
        value: MetricValue::Null,
        pass: Some(false),
        threshold_used: config.threshold,
        details: None,
        error: Some(error.to_string()),
    }
}

/// Placeholder result for a metric that never ran because the provider
/// call failed or the case was skipped. Not a failure of the metric
/// itself, so `pass` stays undetermined.
pub fn unexecuted(config: &MetricConfig, reason: &str) -> MetricResult {
    MetricResult {
        metric: config.metric,
        value: MetricValue::Null,
        pass: None,
        threshold_used: config.threshold,
        details: None,
        error: Some(reason.to_string()),
    }
}
