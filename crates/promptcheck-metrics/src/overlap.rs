//! Lexical overlap metrics: ROUGE-L and (feature-gated) BLEU.
//!
//! Both share the same tokenizer: lowercase, split on anything that is
//! not alphanumeric. Scores are computed against every reference text and
//! the best one is reported.

use promptcheck_core::{MetricValue, ProviderResponse, TestCase};
use serde_json::json;

use crate::error::MetricError;
use crate::registry::Computed;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn reference_tokens(case: &TestCase, metric: &str) -> Result<Vec<Vec<String>>, MetricError> {
    let references = case.expected.reference_texts.as_ref().ok_or_else(|| {
        MetricError::computation(format!("{metric} requires expected.reference_texts"))
    })?;
    if references.is_empty() {
        return Err(MetricError::computation(format!(
            "{metric} requires at least one reference text"
        )));
    }
    Ok(references.iter().map(|r| tokenize(r)).collect())
}

/// Length of the longest common subsequence, two-row DP.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ai in a {
        for (j, bj) in b.iter().enumerate() {
            curr[j + 1] = if ai == bj {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F1 against the best-scoring reference. Details carry the
/// precision and recall behind that F1.
pub(crate) fn rouge_l(
    case: &TestCase,
    response: &ProviderResponse,
) -> Result<Computed, MetricError> {
    let references = reference_tokens(case, "rouge_l")?;
    let candidate = tokenize(&response.text);

    let mut best = (0.0f64, 0.0f64, 0.0f64); // (f1, precision, recall)
    for reference in &references {
        if candidate.is_empty() || reference.is_empty() {
            continue;
        }
        let lcs = lcs_len(&candidate, reference) as f64;
        let precision = lcs / candidate.len() as f64;
        let recall = lcs / reference.len() as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        if f1 > best.0 {
            best = (f1, precision, recall);
        }
    }

    Ok(Computed {
        value: MetricValue::Number(best.0),
        details: Some(json!({
            "precision": best.1,
            "recall": best.2,
        })),
    })
}

#[cfg(feature = "bleu")]
pub(crate) use bleu_impl::bleu;

#[cfg(feature = "bleu")]
mod bleu_impl {
    use std::collections::HashMap;

    use super::*;

    const MAX_ORDER: usize = 4;
    /// Smoothing floor for n-gram precisions with zero matches.
    const EPSILON: f64 = 1e-9;

    fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], u32> {
        let mut counts: HashMap<&[String], u32> = HashMap::new();
        if tokens.len() >= n {
            for window in tokens.windows(n) {
                *counts.entry(window).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Corpus-of-one BLEU with clipped n-gram counts up to order 4,
    /// epsilon smoothing and brevity penalty. Multiple references clip
    /// against the per-reference maximum; the brevity penalty uses the
    /// reference length closest to the candidate.
    pub(crate) fn bleu(
        case: &TestCase,
        response: &ProviderResponse,
    ) -> Result<Computed, MetricError> {
        let references = reference_tokens(case, "bleu")?;
        let candidate = tokenize(&response.text);

        if candidate.is_empty() {
            return Ok(Computed::value(MetricValue::Number(0.0)));
        }

        let mut log_precision_sum = 0.0f64;
        let mut precisions = Vec::with_capacity(MAX_ORDER);
        for n in 1..=MAX_ORDER {
            let cand_counts = ngram_counts(&candidate, n);
            let total: u32 = cand_counts.values().sum();

            let mut clipped = 0u32;
            for (ngram, &count) in &cand_counts {
                let max_ref = references
                    .iter()
                    .map(|r| ngram_counts(r, n).get(ngram).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                clipped += count.min(max_ref);
            }

            let precision = if total == 0 || clipped == 0 {
                EPSILON
            } else {
                f64::from(clipped) / f64::from(total)
            };
            precisions.push(precision);
            log_precision_sum += precision.ln();
        }

        let cand_len = candidate.len() as f64;
        let closest_ref_len = references
            .iter()
            .map(|r| r.len())
            .min_by_key(|&len| ((len as f64 - cand_len).abs() * 1000.0) as u64)
            .unwrap_or(0) as f64;
        let brevity_penalty = if cand_len >= closest_ref_len {
            1.0
        } else {
            (1.0 - closest_ref_len / cand_len).exp()
        };

        let score = brevity_penalty * (log_precision_sum / MAX_ORDER as f64).exp();
        Ok(Computed {
            value: MetricValue::Number(score),
            details: Some(json!({
                "brevity_penalty": brevity_penalty,
                "precisions": precisions,
            })),
        })
    }
}
