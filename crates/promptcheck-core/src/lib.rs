//! Core data model for the PromptCheck evaluation harness.
//!
//! Everything the other crates exchange lives here:
//!
//! - `case`: validated test definitions (`TestCase`, `MetricConfig`, thresholds)
//! - `report`: run output types (`ProviderResponse`, `MetricResult`, `RunReport`)
//! - `config`: the global run configuration file and model resolution
//! - `error`: configuration errors

pub mod case;
pub mod config;
pub mod error;
pub mod report;

pub use case::{
    CaseType, ExpectedOutput, MetricConfig, MetricKind, ModelConfig, ModelParameters, TestCase,
    Threshold, ThresholdOp,
};
pub use config::{RunConfig, CONFIG_FILENAME, DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_S};
pub use error::ConfigError;
pub use report::{
    CostSource, MetricResult, MetricValue, ProviderResponse, RunReport, RunSummary, TestResult,
};
