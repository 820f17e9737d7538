//! Suite loading for PromptCheck.
//!
//! Turns declarative YAML test files into validated, immutable
//! [`promptcheck_core::TestCase`] values. Validation failures are
//! aggregated across every file so one CI run reports every defect.

pub mod error;
pub mod loader;

pub use error::{LoadError, ValidationIssue};
pub use loader::{filter_by_tags, load};
