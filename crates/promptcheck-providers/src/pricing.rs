//! Per-token price table for cost estimation.
//!
//! Used when the provider does not report cost itself. Prices are USD per
//! 1k tokens. Missing entries are not an error; the caller reports cost 0
//! with `CostSource::Unavailable`.

struct PriceEntry {
    provider: &'static str,
    /// Longest matching prefix wins, so dated model ids resolve too.
    model_prefix: &'static str,
    input_per_1k: f64,
    output_per_1k: f64,
}

const PRICE_TABLE: &[PriceEntry] = &[
    PriceEntry {
        provider: "openai",
        model_prefix: "gpt-4o-mini",
        input_per_1k: 0.000_15,
        output_per_1k: 0.000_6,
    },
    PriceEntry {
        provider: "openai",
        model_prefix: "gpt-4o",
        input_per_1k: 0.002_5,
        output_per_1k: 0.01,
    },
    PriceEntry {
        provider: "openai",
        model_prefix: "gpt-4.1-mini",
        input_per_1k: 0.000_4,
        output_per_1k: 0.001_6,
    },
    PriceEntry {
        provider: "openai",
        model_prefix: "gpt-4.1",
        input_per_1k: 0.002,
        output_per_1k: 0.008,
    },
    PriceEntry {
        provider: "openai",
        model_prefix: "gpt-3.5-turbo",
        input_per_1k: 0.000_5,
        output_per_1k: 0.001_5,
    },
    PriceEntry {
        provider: "groq",
        model_prefix: "llama-3.1-8b-instant",
        input_per_1k: 0.000_05,
        output_per_1k: 0.000_08,
    },
    PriceEntry {
        provider: "groq",
        model_prefix: "llama-3.3-70b-versatile",
        input_per_1k: 0.000_59,
        output_per_1k: 0.000_79,
    },
    PriceEntry {
        provider: "groq",
        model_prefix: "mixtral-8x7b",
        input_per_1k: 0.000_24,
        output_per_1k: 0.000_24,
    },
];

/// Estimate call cost from token usage. `None` when the (provider, model)
/// pair has no price entry or the provider reported no usage.
pub fn estimate(
    provider: &str,
    model: &str,
    tokens_prompt: Option<u32>,
    tokens_completion: Option<u32>,
) -> Option<f64> {
    let entry = PRICE_TABLE
        .iter()
        .filter(|e| e.provider == provider && model.starts_with(e.model_prefix))
        .max_by_key(|e| e.model_prefix.len())?;
    let prompt = tokens_prompt? as f64;
    let completion = tokens_completion? as f64;
    Some(prompt / 1000.0 * entry.input_per_1k + completion / 1000.0 * entry.output_per_1k)
}
