//! Test definition loading.
//!
//! Accepts files or directories, parses YAML records, validates them into
//! [`TestCase`] values and substitutes prompt variables. All defects across
//! all files are aggregated before failing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use promptcheck_core::{
    CaseType, ExpectedOutput, MetricConfig, MetricKind, ModelConfig, ModelParameters, TestCase,
    Threshold, ThresholdOp,
};

use crate::error::{LoadError, ValidationIssue};

/// Raw record shape, all fields optional so that validation can report
/// precise field names instead of serde's first missing-field error.
/// Aliases match the original file format.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTestCase {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "type")]
    case_type: Option<String>,
    #[serde(alias = "input_data")]
    input: Option<RawInput>,
    #[serde(alias = "expected_output")]
    expected: Option<ExpectedOutput>,
    #[serde(alias = "metrics")]
    metric_configs: Option<Vec<RawMetricConfig>>,
    #[serde(alias = "model")]
    model_config: Option<RawModelConfig>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    prompt: Option<String>,
    variables: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawMetricConfig {
    metric: Option<String>,
    parameters: Option<serde_json::Value>,
    #[serde(alias = "thresholds")]
    threshold: Option<RawThreshold>,
}

#[derive(Debug, Deserialize)]
struct RawModelConfig {
    provider: Option<String>,
    model_name: Option<String>,
    parameters: Option<ModelParameters>,
}

/// Accepted threshold syntaxes, normalized to [`Threshold`] at load time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawThreshold {
    Full {
        value: f64,
        operator: Option<ThresholdOp>,
    },
    FScore {
        f_score: f64,
    },
    CompletionMax {
        completion_max: f64,
    },
    Bare(f64),
    BareBool(bool),
}

impl RawThreshold {
    fn normalize(self, kind: MetricKind) -> Threshold {
        match self {
            RawThreshold::Full { value, operator } => Threshold {
                value,
                operator: operator.unwrap_or_else(|| kind.default_operator()),
            },
            RawThreshold::FScore { f_score } => Threshold {
                value: f_score,
                operator: kind.default_operator(),
            },
            // Historical token_count form; an upper bound by definition.
            RawThreshold::CompletionMax { completion_max } => Threshold {
                value: completion_max,
                operator: ThresholdOp::Le,
            },
            RawThreshold::Bare(value) => Threshold {
                value,
                operator: kind.default_operator(),
            },
            RawThreshold::BareBool(b) => Threshold {
                value: if b { 1.0 } else { 0.0 },
                operator: kind.default_operator(),
            },
        }
    }
}

/// Load and validate test cases from the given files or directories.
///
/// Directories are searched recursively for `*.yaml` / `*.yml`, in sorted
/// path order so runs are reproducible. Returns every defect found across
/// the whole input set in one [`LoadError`].
pub fn load(paths: &[PathBuf]) -> Result<Vec<TestCase>, LoadError> {
    let mut issues = Vec::new();
    let files = discover_files(paths, &mut issues);

    let mut cases = Vec::new();
    for file in &files {
        load_file(file, &mut cases, &mut issues);
    }

    check_unique_ids(&cases, &mut issues);

    if issues.is_empty() {
        debug!(cases = cases.len(), files = files.len(), "suite loaded");
        Ok(cases.into_iter().map(|(_, _, case)| case).collect())
    } else {
        Err(LoadError::new(issues))
    }
}

/// Keep only cases carrying at least one of the requested tags. An empty
/// filter keeps everything.
pub fn filter_by_tags(cases: Vec<TestCase>, tags: &[String]) -> Vec<TestCase> {
    if tags.is_empty() {
        return cases;
    }
    cases
        .into_iter()
        .filter(|case| tags.iter().any(|t| case.tags.contains(t)))
        .collect()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn discover_files(paths: &[PathBuf], issues: &mut Vec<ValidationIssue>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if is_yaml(path) {
                files.push(path.clone());
            } else {
                issues.push(ValidationIssue {
                    file: path.clone(),
                    case_index: None,
                    field: None,
                    message: "not a YAML test file".to_string(),
                });
            }
        } else if path.is_dir() {
            collect_dir(path, &mut files, issues);
        } else {
            issues.push(ValidationIssue {
                file: path.clone(),
                case_index: None,
                field: None,
                message: "path does not exist".to_string(),
            });
        }
    }
    files.sort();
    files
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>, issues: &mut Vec<ValidationIssue>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            issues.push(ValidationIssue {
                file: dir.to_path_buf(),
                case_index: None,
                field: None,
                message: format!("could not read directory: {err}"),
            });
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_dir(&path, files, issues);
        } else if is_yaml(&path) {
            files.push(path);
        }
    }
}

fn load_file(
    file: &Path,
    cases: &mut Vec<(PathBuf, usize, TestCase)>,
    issues: &mut Vec<ValidationIssue>,
) {
    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(err) => {
            issues.push(ValidationIssue {
                file: file.to_path_buf(),
                case_index: None,
                field: None,
                message: format!("could not read file: {err}"),
            });
            return;
        }
    };

    let root: serde_yaml::Value = match serde_yaml::from_str(&raw) {
        Ok(root) => root,
        Err(err) => {
            issues.push(ValidationIssue {
                file: file.to_path_buf(),
                case_index: None,
                field: None,
                message: format!("invalid YAML: {err}"),
            });
            return;
        }
    };

    let records = match root {
        // An empty file holds zero test cases; not an error.
        serde_yaml::Value::Null => return,
        serde_yaml::Value::Sequence(records) => records,
        _ => {
            issues.push(ValidationIssue {
                file: file.to_path_buf(),
                case_index: None,
                field: None,
                message: "file content must be a list of test cases".to_string(),
            });
            return;
        }
    };

    for (index, record) in records.into_iter().enumerate() {
        if let Some(case) = convert_record(file, index, record, issues) {
            cases.push((file.to_path_buf(), index, case));
        }
    }
}

fn convert_record(
    file: &Path,
    index: usize,
    record: serde_yaml::Value,
    issues: &mut Vec<ValidationIssue>,
) -> Option<TestCase> {
    let issue = |field: Option<&str>, message: String| ValidationIssue {
        file: file.to_path_buf(),
        case_index: Some(index),
        field: field.map(str::to_string),
        message,
    };

    let raw: RawTestCase = match serde_yaml::from_value(record) {
        Ok(raw) => raw,
        Err(err) => {
            issues.push(issue(None, format!("invalid test case: {err}")));
            return None;
        }
    };

    let before = issues.len();

    let name = raw.name.clone().unwrap_or_default();
    if raw.name.is_none() {
        issues.push(issue(Some("name"), "required field is missing".to_string()));
    }

    let case_type = match raw.case_type.as_deref() {
        None | Some("llm_generation") => CaseType::LlmGeneration,
        Some(other) => {
            issues.push(issue(Some("type"), format!("unsupported test type '{other}'")));
            CaseType::LlmGeneration
        }
    };

    let prompt = match &raw.input {
        Some(RawInput {
            prompt: Some(template),
            variables,
        }) => match substitute_variables(template, variables.as_ref()) {
            Ok(prompt) => prompt,
            Err(message) => {
                issues.push(issue(Some("input.prompt"), message));
                String::new()
            }
        },
        Some(RawInput { prompt: None, .. }) => {
            issues.push(issue(Some("input.prompt"), "required field is missing".to_string()));
            String::new()
        }
        None => {
            issues.push(issue(Some("input"), "required field is missing".to_string()));
            String::new()
        }
    };

    let expected = raw.expected.clone().unwrap_or_default();
    if let Some(pattern) = &expected.regex_pattern {
        if let Err(err) = Regex::new(pattern) {
            issues.push(issue(
                Some("expected.regex_pattern"),
                format!("invalid regex: {err}"),
            ));
        }
    }

    let metric_configs = match raw.metric_configs {
        Some(raws) if !raws.is_empty() => {
            let mut configs = Vec::with_capacity(raws.len());
            for (m_idx, m) in raws.into_iter().enumerate() {
                let field = format!("metric_configs[{m_idx}].metric");
                let Some(metric_name) = m.metric else {
                    issues.push(issue(Some(field.as_str()), "required field is missing".to_string()));
                    continue;
                };
                let kind: MetricKind =
                    match serde_json::from_value(serde_json::Value::String(metric_name.clone())) {
                        Ok(kind) => kind,
                        Err(_) => {
                            issues.push(issue(
                                Some(field.as_str()),
                                format!("unknown metric '{metric_name}'"),
                            ));
                            continue;
                        }
                    };
                configs.push(MetricConfig {
                    metric: kind,
                    parameters: m.parameters,
                    threshold: m.threshold.map(|t| t.normalize(kind)),
                });
            }
            configs
        }
        Some(_) => {
            issues.push(issue(Some("metric_configs"), "must not be empty".to_string()));
            Vec::new()
        }
        None => {
            issues.push(issue(Some("metric_configs"), "required field is missing".to_string()));
            Vec::new()
        }
    };

    let model_config = match raw.model_config {
        Some(raw_model) => {
            let provider = match raw_model.provider {
                Some(provider) => provider,
                None => {
                    issues.push(issue(
                        Some("model_config.provider"),
                        "required field is missing".to_string(),
                    ));
                    String::new()
                }
            };
            ModelConfig {
                provider,
                model_name: raw_model.model_name.unwrap_or_else(|| "default".to_string()),
                parameters: raw_model.parameters.unwrap_or_default(),
            }
        }
        None => {
            issues.push(issue(Some("model_config"), "required field is missing".to_string()));
            ModelConfig::default()
        }
    };

    // Parameter ranges are enforced here so execution never sees a value
    // it cannot turn into a Duration or request field.
    let params = &model_config.parameters;
    if let Some(timeout_s) = params.timeout_s {
        if !timeout_s.is_finite() || timeout_s <= 0.0 {
            issues.push(issue(
                Some("model_config.parameters.timeout_s"),
                format!("must be a positive number, got {timeout_s}"),
            ));
        }
    }
    if let Some(temperature) = params.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            issues.push(issue(
                Some("model_config.parameters.temperature"),
                format!("must be between 0 and 2, got {temperature}"),
            ));
        }
    }
    if let Some(retry_attempts) = params.retry_attempts {
        if retry_attempts > 5 {
            issues.push(issue(
                Some("model_config.parameters.retry_attempts"),
                format!("must be at most 5, got {retry_attempts}"),
            ));
        }
    }
    if params.max_tokens == Some(0) {
        issues.push(issue(
            Some("model_config.parameters.max_tokens"),
            "must be positive".to_string(),
        ));
    }

    if issues.len() > before {
        return None;
    }

    let file_stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("suite");
    let id = raw.id.unwrap_or_else(|| format!("{file_stem}::{index}"));

    Some(TestCase {
        id,
        name,
        description: raw.description,
        tags: raw.tags.into_iter().collect::<BTreeSet<_>>(),
        case_type,
        prompt,
        expected,
        metric_configs,
        model_config,
    })
}

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder pattern")
    })
}

/// Substitute `{{name}}` placeholders with literal variable values.
/// Every referenced variable must be defined; unused variables are fine.
fn substitute_variables(
    template: &str,
    variables: Option<&BTreeMap<String, serde_yaml::Value>>,
) -> Result<String, String> {
    let mut undefined = Vec::new();
    let rendered = var_pattern().replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match variables.and_then(|vars| vars.get(name)) {
            Some(value) => match render_variable(value) {
                Some(text) => text,
                None => {
                    undefined.push(format!("variable '{name}' has an unsupported value type"));
                    String::new()
                }
            },
            None => {
                undefined.push(format!("undefined variable '{name}'"));
                String::new()
            }
        }
    });
    if undefined.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(undefined.join("; "))
    }
}

fn render_variable(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn check_unique_ids(cases: &[(PathBuf, usize, TestCase)], issues: &mut Vec<ValidationIssue>) {
    let mut seen: BTreeMap<&str, &Path> = BTreeMap::new();
    for (file, index, case) in cases {
        if let Some(first_file) = seen.get(case.id.as_str()) {
            issues.push(ValidationIssue {
                file: file.clone(),
                case_index: Some(*index),
                field: Some("id".to_string()),
                message: format!(
                    "duplicate test case id '{}' (first defined in {})",
                    case.id,
                    first_file.display()
                ),
            });
        } else {
            seen.insert(case.id.as_str(), file.as_path());
        }
    }
}
