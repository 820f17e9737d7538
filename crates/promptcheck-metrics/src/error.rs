use promptcheck_core::MetricKind;
use thiserror::Error;

/// Why a metric could not produce a value. Evaluation converts these into
/// failed metric results instead of aborting the test case.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metric '{0}' is not supported by this build")]
    Unsupported(MetricKind),
    #[error("{0}")]
    Computation(String),
}

impl MetricError {
    pub fn computation(message: impl Into<String>) -> Self {
        MetricError::Computation(message.into())
    }
}
