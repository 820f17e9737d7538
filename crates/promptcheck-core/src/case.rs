//! Validated test case definitions.
//!
//! These are the types the suite loader produces after alias handling,
//! threshold normalization and variable substitution. Execution code never
//! sees raw YAML shapes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Kind of test case. Only LLM text generation is supported today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    #[default]
    LlmGeneration,
}

/// One declarative test case, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Unique id within a run. Synthesized by the loader when absent.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    /// Prompt with all `{{variable}}` placeholders already substituted.
    pub prompt: String,
    pub expected: ExpectedOutput,
    pub metric_configs: Vec<MetricConfig>,
    pub model_config: ModelConfig,
}

/// Expected characteristics of the model response, used by match and
/// overlap metrics. All fields are optional; each metric validates the
/// field it needs at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    pub exact_match_string: Option<String>,
    pub regex_pattern: Option<String>,
    pub reference_texts: Option<Vec<String>>,
}

/// Enumerated metric kinds. Serialized names are the wire contract for
/// test files and the report artifact; aliases cover the historical
/// rouge spellings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ExactMatch,
    RegexMatch,
    #[serde(alias = "rougeL", alias = "rougeL_f1")]
    RougeL,
    Bleu,
    TokenCount,
    Latency,
    Cost,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::ExactMatch => "exact_match",
            MetricKind::RegexMatch => "regex_match",
            MetricKind::RougeL => "rouge_l",
            MetricKind::Bleu => "bleu",
            MetricKind::TokenCount => "token_count",
            MetricKind::Latency => "latency",
            MetricKind::Cost => "cost",
        }
    }

    /// Whether the metric yields a boolean value.
    pub fn is_boolean(self) -> bool {
        matches!(self, MetricKind::ExactMatch | MetricKind::RegexMatch)
    }

    /// Operator used when a threshold is given as a bare scalar.
    ///
    /// Scores are "at least", resource metrics are "at most", boolean
    /// metrics are equality.
    pub fn default_operator(self) -> ThresholdOp {
        match self {
            MetricKind::ExactMatch | MetricKind::RegexMatch => ThresholdOp::Eq,
            MetricKind::RougeL | MetricKind::Bleu => ThresholdOp::Ge,
            MetricKind::TokenCount | MetricKind::Latency | MetricKind::Cost => ThresholdOp::Le,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator applied between a metric value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl ThresholdOp {
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            ThresholdOp::Le => value <= threshold,
            ThresholdOp::Lt => value < threshold,
            ThresholdOp::Ge => value >= threshold,
            ThresholdOp::Gt => value > threshold,
            ThresholdOp::Eq => value == threshold,
            ThresholdOp::Ne => value != threshold,
        }
    }
}

/// Canonical threshold form. The loader normalizes the accepted input
/// shapes (bare scalar, `{value, operator}`, `{f_score}`) into this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    pub operator: ThresholdOp,
}

/// One configured metric on a test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricConfig {
    pub metric: MetricKind,
    /// Metric-specific parameters, e.g. `{"count_types": ["completion"]}`.
    pub parameters: Option<serde_json::Value>,
    pub threshold: Option<Threshold>,
}

/// Provider and model selection for a test case.
///
/// `provider` and `model_name` may be the literal `"default"`, resolved
/// against the global config by [`crate::RunConfig::resolve_model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model_name: String,
    #[serde(default)]
    pub parameters: ModelParameters,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "default".to_string(),
            model_name: "default".to_string(),
            parameters: ModelParameters::default(),
        }
    }
}

/// Tunable request parameters. Unset fields fall back to the global
/// defaults, then to built-in constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Timeout for a single provider call attempt, in seconds.
    pub timeout_s: Option<f64>,
    /// Additional attempts after the first failure.
    pub retry_attempts: Option<u32>,
}

impl ModelParameters {
    /// Merge `self` (the base) with `over` (the override); set fields in
    /// `over` win.
    pub fn merged_with(&self, over: &ModelParameters) -> ModelParameters {
        ModelParameters {
            temperature: over.temperature.or(self.temperature),
            max_tokens: over.max_tokens.or(self.max_tokens),
            timeout_s: over.timeout_s.or(self.timeout_s),
            retry_attempts: over.retry_attempts.or(self.retry_attempts),
        }
    }
}
