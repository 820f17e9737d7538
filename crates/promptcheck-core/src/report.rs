//! Run output types.
//!
//! Field names and nesting are the wire contract consumed by the PR
//! comment poster and the dashboard; keep them stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::case::{MetricKind, Threshold};

/// Where the reported cost figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Read from provider response metadata.
    Provider,
    /// Estimated from the built-in per-token price table.
    PriceTable,
    /// No price entry for this (provider, model); cost reported as 0.
    Unavailable,
}

/// Normalized response from a successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub tokens_prompt: Option<u32>,
    pub tokens_completion: Option<u32>,
    /// Wall time from the first attempt start to the final success.
    pub latency_ms: u64,
    pub cost: f64,
    pub cost_source: CostSource,
    /// Total attempts consumed, including the successful one.
    pub raw_attempts: u32,
    pub model_name: String,
}

impl ProviderResponse {
    pub fn tokens_total(&self) -> Option<u32> {
        match (self.tokens_prompt, self.tokens_completion) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
        }
    }
}

/// A computed metric value. `Null` means the value could not be computed
/// (missing expected field, unsupported metric, no response).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
    Null,
}

impl MetricValue {
    /// Numeric view used by threshold comparison; booleans map to 1/0.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            MetricValue::Bool(true) => Some(1.0),
            MetricValue::Bool(false) => Some(0.0),
            MetricValue::Number(n) => Some(n),
            MetricValue::Null => None,
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, MetricValue::Null)
    }
}

/// Outcome of one configured metric on one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: MetricKind,
    pub value: MetricValue,
    /// `None` means observational: no threshold was configured.
    pub pass: Option<bool>,
    /// Echo of the configured threshold, for audit.
    pub threshold_used: Option<Threshold>,
    /// Metric-specific extras (rouge precision/recall, token breakdown).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: String,
    pub test_case_name: String,
    /// `None` when the provider call failed terminally.
    pub response: Option<ProviderResponse>,
    pub metric_results: Vec<MetricResult>,
    pub overall_pass: bool,
    /// Terminal provider error, if the call never succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run-level aggregates derived from the test results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub duration_ms: u64,
}

/// The single source of truth for a run. Test order equals input order
/// regardless of execution concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub test_results: Vec<TestResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }
}
