//! Resource metrics read off the provider response: token usage, latency
//! and cost. These never look at the response text.

use promptcheck_core::{MetricConfig, MetricValue, ProviderResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::MetricError;
use crate::registry::Computed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CountType {
    Prompt,
    Completion,
    Total,
}

impl CountType {
    fn as_str(self) -> &'static str {
        match self {
            CountType::Prompt => "prompt",
            CountType::Completion => "completion",
            CountType::Total => "total",
        }
    }

    fn read(self, response: &ProviderResponse) -> Option<u32> {
        match self {
            CountType::Prompt => response.tokens_prompt,
            CountType::Completion => response.tokens_completion,
            CountType::Total => response.tokens_total(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TokenCountParams {
    count_types: Vec<CountType>,
}

impl Default for TokenCountParams {
    fn default() -> Self {
        Self {
            count_types: vec![CountType::Total],
        }
    }
}

/// Token usage. `parameters.count_types` selects which counts to report;
/// the first one becomes the metric value and all of them land in details.
pub(crate) fn token_count(
    config: &MetricConfig,
    response: &ProviderResponse,
) -> Result<Computed, MetricError> {
    let params: TokenCountParams = match &config.parameters {
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|err| MetricError::computation(format!("invalid token_count parameters: {err}")))?,
        None => TokenCountParams::default(),
    };
    if params.count_types.is_empty() {
        return Err(MetricError::computation(
            "token_count requires at least one count type",
        ));
    }

    let mut details = serde_json::Map::new();
    let mut first = None;
    for count_type in &params.count_types {
        let count = count_type.read(response).ok_or_else(|| {
            MetricError::computation(format!(
                "provider did not report {} token usage",
                count_type.as_str()
            ))
        })?;
        details.insert(count_type.as_str().to_string(), json!(count));
        if first.is_none() {
            first = Some(count);
        }
    }

    Ok(Computed {
        value: MetricValue::Number(f64::from(first.unwrap_or(0))),
        details: Some(serde_json::Value::Object(details)),
    })
}

/// Wall time of the provider call in milliseconds, retries included.
pub(crate) fn latency(response: &ProviderResponse) -> Result<Computed, MetricError> {
    Ok(Computed::value(MetricValue::Number(
        response.latency_ms as f64,
    )))
}

/// Attributed cost in USD. Details record where the figure came from.
pub(crate) fn cost(response: &ProviderResponse) -> Result<Computed, MetricError> {
    Ok(Computed {
        value: MetricValue::Number(response.cost),
        details: Some(json!({ "cost_source": response.cost_source })),
    })
}

#[cfg(test)]
mod tests {
    use promptcheck_core::{CostSource, MetricKind};

    use super::*;

    fn response() -> ProviderResponse {
        ProviderResponse {
            text: "hi".into(),
            tokens_prompt: Some(10),
            tokens_completion: Some(5),
            latency_ms: 250,
            cost: 0.0123,
            cost_source: CostSource::PriceTable,
            raw_attempts: 1,
            model_name: "m".into(),
        }
    }

    fn token_config(parameters: Option<serde_json::Value>) -> MetricConfig {
        MetricConfig {
            metric: MetricKind::TokenCount,
            parameters,
            threshold: None,
        }
    }

    #[test]
    fn token_count_defaults_to_total() {
        let computed = token_count(&token_config(None), &response()).unwrap();
        assert_eq!(computed.value, MetricValue::Number(15.0));
        assert_eq!(computed.details.unwrap()["total"], 15);
    }

    #[test]
    fn token_count_first_requested_type_is_the_value() {
        let config = token_config(Some(json!({ "count_types": ["completion", "prompt"] })));
        let computed = token_count(&config, &response()).unwrap();
        assert_eq!(computed.value, MetricValue::Number(5.0));
        let details = computed.details.unwrap();
        assert_eq!(details["completion"], 5);
        assert_eq!(details["prompt"], 10);
    }

    #[test]
    fn token_count_fails_when_usage_is_missing() {
        let mut resp = response();
        resp.tokens_prompt = None;
        resp.tokens_completion = None;
        let err = token_count(&token_config(None), &resp).unwrap_err();
        assert!(err.to_string().contains("token usage"));
    }

    #[test]
    fn token_count_rejects_unknown_count_types() {
        let config = token_config(Some(json!({ "count_types": ["wordz"] })));
        assert!(token_count(&config, &response()).is_err());
    }

    #[test]
    fn latency_and_cost_read_straight_off_the_response() {
        let lat = latency(&response()).unwrap();
        assert_eq!(lat.value, MetricValue::Number(250.0));

        let cost = cost(&response()).unwrap();
        assert_eq!(cost.value, MetricValue::Number(0.0123));
        assert_eq!(cost.details.unwrap()["cost_source"], "price_table");
    }
}
