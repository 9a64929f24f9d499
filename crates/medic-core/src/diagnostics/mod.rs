//! Log Classifier.
//!
//! Turns helper-process log text into typed [`ClassifiedError`] records.
//!
//! - [`classifier`] - ordered rule table and per-line classification
//! - [`logs`] - locating, tailing and time-filtering log files
//! - [`analysis`] - per-client aggregate with de-duplication and helper "ok" flags

pub mod analysis;
pub mod classifier;
pub mod logs;
pub mod types;

pub use analysis::{ClientAnalysis, LogScanOptions, analyze_client};
pub use classifier::{ClassificationRule, LogClassifier};
pub use types::{ClassifiedError, ErrorKind};
