//! Concurrent test execution for PromptCheck.
//!
//! [`execute_run`] drives loaded test cases through the provider layer
//! and metric evaluation under a bounded worker pool, producing one
//! [`promptcheck_core::RunReport`] with a result per case in input order.

pub mod execute;

pub use execute::{execute_run, exit_code, ProgressSink, RunOptions};
