//! Health Evaluator.
//!
//! Reduces classified errors and liveness into a [`HealthLevel`] per helper,
//! per client and overall.

pub mod operations;
pub mod types;

pub use operations::{evaluate, evaluate_client, evaluate_helper, evaluate_overall, system_status};
pub use types::{ClientStatus, HealthLevel, HelperHealth, SystemStatus};
