//! Boolean match metrics over response text.

use promptcheck_core::{MetricValue, ProviderResponse, TestCase};
use regex::Regex;

use crate::error::MetricError;
use crate::registry::Computed;

/// Case-sensitive equality after trimming surrounding whitespace from the
/// response. The expected string is compared as written.
pub(crate) fn exact_match(
    case: &TestCase,
    response: &ProviderResponse,
) -> Result<Computed, MetricError> {
    let expected = case.expected.exact_match_string.as_ref().ok_or_else(|| {
        MetricError::computation("exact_match requires expected.exact_match_string")
    })?;
    let matched = response.text.trim() == expected.as_str();
    Ok(Computed::value(MetricValue::Bool(matched)))
}

/// Unanchored regex search over the full, untrimmed response text.
pub(crate) fn regex_match(
    case: &TestCase,
    response: &ProviderResponse,
) -> Result<Computed, MetricError> {
    let pattern = case
        .expected
        .regex_pattern
        .as_ref()
        .ok_or_else(|| MetricError::computation("regex_match requires expected.regex_pattern"))?;
    // The loader validates patterns up front; a failure here means the
    // case was constructed programmatically.
    let regex = Regex::new(pattern)
        .map_err(|err| MetricError::computation(format!("invalid regex pattern: {err}")))?;
    Ok(Computed::value(MetricValue::Bool(
        regex.is_match(&response.text),
    )))
}

#[cfg(test)]
mod tests {
    use promptcheck_core::{CostSource, ExpectedOutput};

    use super::*;

    fn response_with(text: &str) -> ProviderResponse {
        ProviderResponse {
            text: text.to_string(),
            tokens_prompt: Some(10),
            tokens_completion: Some(5),
            latency_ms: 100,
            cost: 0.0,
            cost_source: CostSource::Unavailable,
            raw_attempts: 1,
            model_name: "test-model".into(),
        }
    }

    fn case_with(expected: ExpectedOutput) -> TestCase {
        TestCase {
            id: "t".into(),
            name: "t".into(),
            description: None,
            tags: Default::default(),
            case_type: Default::default(),
            prompt: "p".into(),
            expected,
            metric_configs: vec![],
            model_config: Default::default(),
        }
    }

    #[test]
    fn exact_match_trims_response_but_stays_case_sensitive() {
        let case = case_with(ExpectedOutput {
            exact_match_string: Some("Hello!".into()),
            ..Default::default()
        });

        let hit = exact_match(&case, &response_with("  Hello!\n")).unwrap();
        assert_eq!(hit.value, MetricValue::Bool(true));

        let miss = exact_match(&case, &response_with("hello!")).unwrap();
        assert_eq!(miss.value, MetricValue::Bool(false));
    }

    #[test]
    fn exact_match_without_expected_string_is_an_error() {
        let case = case_with(ExpectedOutput::default());
        let err = exact_match(&case, &response_with("anything")).unwrap_err();
        assert!(err.to_string().contains("exact_match_string"));
    }

    #[test]
    fn regex_match_is_a_search_not_a_full_match() {
        let case = case_with(ExpectedOutput {
            regex_pattern: Some("(?i)(hello|hi)".into()),
            ..Default::default()
        });

        let hit = regex_match(&case, &response_with("Hi there, friend.")).unwrap();
        assert_eq!(hit.value, MetricValue::Bool(true));

        let miss = regex_match(&case, &response_with("Good morning.")).unwrap();
        assert_eq!(miss.value, MetricValue::Bool(false));
    }

    #[test]
    fn regex_match_reports_invalid_patterns() {
        let case = case_with(ExpectedOutput {
            regex_pattern: Some("(unclosed".into()),
            ..Default::default()
        });
        let err = regex_match(&case, &response_with("x")).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }
}
