//! Metric computation for PromptCheck.
//!
//! [`MetricRegistry::evaluate`] turns one metric configuration plus a
//! provider response into a [`promptcheck_core::MetricResult`], applying
//! the configured threshold. Evaluation is infallible by construction:
//! anything that goes wrong becomes a failed result, never an `Err`.

pub mod error;
mod overlap;
pub mod registry;
mod text;
mod usage;

pub use error::MetricError;
pub use registry::{unexecuted, MetricRegistry};
