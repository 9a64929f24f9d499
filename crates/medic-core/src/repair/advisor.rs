//! Optional external repair advisor.
//!
//! The advisor only ranks and supplements template fixes. Its output is
//! validated here and anything it gets wrong is dropped, so an unavailable
//! or misbehaving advisor leaves plain template planning in place.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::{ClassifiedError, ErrorKind};
use crate::repair::errors::AdvisorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorSuggestion {
    pub error_kind: ErrorKind,
    pub description: String,
    #[serde(default)]
    pub remediation_steps: Vec<String>,
    /// Advisory ranking input in `[0, 1]`.
    pub confidence: f64,
}

/// Source of ranked repair suggestions.
pub trait RepairAdvisor: Send + Sync {
    fn suggest(
        &self,
        log_text: &str,
        known_errors: &[ClassifiedError],
    ) -> Result<Vec<AdvisorSuggestion>, AdvisorError>;
}

/// Ask the advisor and keep only well-formed suggestions, best first.
///
/// Errors degrade to an empty list.
pub fn collect_suggestions(
    advisor: &dyn RepairAdvisor,
    log_text: &str,
    known_errors: &[ClassifiedError],
) -> Vec<AdvisorSuggestion> {
    let suggestions = match advisor.suggest(log_text, known_errors) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!(event = "core.repair.advisor_failed", error = %e);
            return Vec::new();
        }
    };

    let total = suggestions.len();
    let mut valid: Vec<AdvisorSuggestion> = suggestions
        .into_iter()
        .filter(|s| {
            s.confidence.is_finite()
                && (0.0..=1.0).contains(&s.confidence)
                && !s.description.trim().is_empty()
        })
        .collect();

    if valid.len() != total {
        warn!(
            event = "core.repair.advisor_suggestions_discarded",
            discarded = total - valid.len()
        );
    }

    valid.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    valid
}
