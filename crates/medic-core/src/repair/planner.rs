//! Turning classified errors into a repair plan.

use std::sync::Arc;
use tracing::info;

use crate::clients::TargetClient;
use crate::diagnostics::ClassifiedError;
use crate::repair::advisor::{AdvisorSuggestion, RepairAdvisor, collect_suggestions};
use crate::repair::templates::{TemplateContext, template_fix};
use crate::repair::types::{RepairFix, RepairPlan};

/// Shape given to errors synthesized from advisor suggestions.
pub const SHAPE_ADVISOR: &str = "advisor";

pub struct RepairPlanner {
    context: TemplateContext,
    advisor: Option<Arc<dyn RepairAdvisor>>,
}

impl RepairPlanner {
    pub fn new(context: TemplateContext) -> Self {
        Self {
            context,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn RepairAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Template planning: one fix per fixable error that has a template.
    ///
    /// Fixable errors without a template are left out of the plan, both its
    /// fixes and its targeted errors. Errors that would produce identical
    /// changes are all targeted but yield a single fix.
    pub fn plan(&self, client: &TargetClient, errors: &[ClassifiedError]) -> RepairPlan {
        let mut targeted: Vec<ClassifiedError> = Vec::new();
        let mut fixes: Vec<RepairFix> = Vec::new();

        for error in errors.iter().filter(|e| e.fixable) {
            if targeted.iter().any(|t| t.dedup_key() == error.dedup_key()) {
                continue;
            }
            let Some(fix) = template_fix(client, error, &self.context) else {
                continue;
            };
            targeted.push(error.clone());
            if fixes.iter().any(|f| f.changes == fix.changes) {
                continue;
            }
            fixes.push(fix);
        }

        let plan = RepairPlan::new(client.key(), targeted, fixes);
        info!(
            event = "core.repair.plan_completed",
            client = %client.kind,
            error_count = plan.errors.len(),
            fix_count = plan.fixes.len(),
            requires_confirmation = plan.requires_confirmation
        );
        plan
    }

    /// Template planning ranked and supplemented by the advisor, if any.
    ///
    /// Template fixes are reordered by the best confidence the advisor gave
    /// their error kind (stable for ties and unranked fixes). Suggestions for
    /// kinds no template fix covers are appended as manual fixes.
    pub fn plan_with_advice(
        &self,
        client: &TargetClient,
        errors: &[ClassifiedError],
        log_text: &str,
    ) -> RepairPlan {
        let plan = self.plan(client, errors);
        let Some(advisor) = &self.advisor else {
            return plan;
        };

        let suggestions = collect_suggestions(advisor.as_ref(), log_text, errors);
        if suggestions.is_empty() {
            return plan;
        }

        let mut fixes: Vec<RepairFix> = plan
            .fixes
            .into_iter()
            .map(|mut fix| {
                fix.confidence = best_confidence(&suggestions, &fix);
                fix
            })
            .collect();
        fixes.sort_by(|a, b| {
            let a = a.confidence.unwrap_or(-1.0);
            let b = b.confidence.unwrap_or(-1.0);
            b.total_cmp(&a)
        });

        for suggestion in &suggestions {
            if fixes.iter().any(|f| f.for_error.kind == suggestion.error_kind) {
                continue;
            }
            fixes.push(advisor_fix(client, errors, suggestion));
        }

        info!(
            event = "core.repair.plan_advised",
            client = %client.kind,
            suggestion_count = suggestions.len(),
            fix_count = fixes.len()
        );
        RepairPlan::new(plan.target, plan.errors, fixes)
    }
}

fn best_confidence(suggestions: &[AdvisorSuggestion], fix: &RepairFix) -> Option<f64> {
    suggestions
        .iter()
        .filter(|s| s.error_kind == fix.for_error.kind)
        .map(|s| s.confidence)
        .reduce(f64::max)
}

fn advisor_fix(
    client: &TargetClient,
    errors: &[ClassifiedError],
    suggestion: &AdvisorSuggestion,
) -> RepairFix {
    let for_error = errors
        .iter()
        .find(|e| e.kind == suggestion.error_kind)
        .cloned()
        .unwrap_or_else(|| ClassifiedError {
            kind: suggestion.error_kind,
            message: suggestion.description.clone(),
            raw_evidence: String::new(),
            shape: SHAPE_ADVISOR.to_string(),
            subject: None,
            helper: None,
            client: Some(client.kind),
            fixable: false,
        });
    RepairFix {
        for_error,
        description: suggestion.description.clone(),
        changes: Vec::new(),
        automatic: false,
        confidence: Some(suggestion.confidence),
        remediation: suggestion.remediation_steps.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientKind, HelperProcess};
    use crate::diagnostics::ErrorKind;
    use crate::diagnostics::classifier::{SHAPE_COMMAND_NOT_FOUND, SHAPE_MODULE_NOT_FOUND, SHAPE_NETWORK};
    use crate::platform::Platform;
    use crate::repair::errors::AdvisorError;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn planner() -> RepairPlanner {
        RepairPlanner::new(TemplateContext {
            platform: Platform::Linux,
            search_dirs: vec![],
            host_env: BTreeMap::new(),
            home: std::env::temp_dir(),
        })
    }

    fn client() -> TargetClient {
        TargetClient {
            kind: ClientKind::Cursor,
            display_name: "Cursor".to_string(),
            config_path: PathBuf::from("/x/mcp.json"),
            log_dirs: vec![],
            process_patterns: vec![],
            helper_processes: vec![
                HelperProcess::new("gh", "npx").with_args(["server-github"]),
                HelperProcess::new("git", "uvx"),
            ],
        }
    }

    fn error(kind: ErrorKind, shape: &str, subject: &str, helper: &str, fixable: bool) -> ClassifiedError {
        ClassifiedError {
            kind,
            message: format!("{} {}", shape, subject),
            raw_evidence: String::new(),
            shape: shape.to_string(),
            subject: Some(subject.to_string()),
            helper: Some(helper.to_string()),
            client: Some(ClientKind::Cursor),
            fixable,
        }
    }

    struct StubAdvisor(Vec<AdvisorSuggestion>);

    impl RepairAdvisor for StubAdvisor {
        fn suggest(
            &self,
            _log_text: &str,
            _known_errors: &[ClassifiedError],
        ) -> Result<Vec<AdvisorSuggestion>, AdvisorError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenAdvisor;

    impl RepairAdvisor for BrokenAdvisor {
        fn suggest(
            &self,
            _log_text: &str,
            _known_errors: &[ClassifiedError],
        ) -> Result<Vec<AdvisorSuggestion>, AdvisorError> {
            Err(AdvisorError::Malformed {
                message: "not json".to_string(),
            })
        }
    }

    fn errors() -> Vec<ClassifiedError> {
        vec![
            error(ErrorKind::PathError, SHAPE_MODULE_NOT_FOUND, "server-github", "gh", true),
            error(ErrorKind::PathError, SHAPE_COMMAND_NOT_FOUND, "uvx", "git", true),
            error(ErrorKind::NetworkError, SHAPE_NETWORK, "", "gh", false),
            error(ErrorKind::ProcessError, "custom", "", "gh", true),
        ]
    }

    #[test]
    fn test_plan_includes_only_templated_fixable_errors() {
        let plan = planner().plan(&client(), &errors());
        assert_eq!(plan.errors.len(), 2);
        assert!(plan.errors.iter().all(|e| e.shape != "custom"));
        assert_eq!(plan.fixes.len(), 2);
        assert!(plan.fixes[0].automatic);
        // uvx cannot be resolved, so its fix is a manual step.
        assert!(!plan.fixes[1].automatic);
        assert!(plan.requires_confirmation);
    }

    #[test]
    fn test_duplicate_errors_yield_one_fix() {
        let mut errs = errors();
        let mut dup = errs[0].clone();
        dup.raw_evidence = "isolation".to_string();
        errs.push(dup);
        let plan = planner().plan(&client(), &errs);
        assert_eq!(plan.errors.len(), 2);
        assert_eq!(plan.fixes.len(), 2);
    }

    #[test]
    fn test_empty_plan_needs_no_confirmation() {
        let plan = planner().plan(&client(), &[]);
        assert!(plan.is_empty());
        assert!(!plan.requires_confirmation);
    }

    #[test]
    fn test_advisor_reorders_and_appends() {
        let advisor = StubAdvisor(vec![
            AdvisorSuggestion {
                error_kind: ErrorKind::NetworkError,
                description: "Check the proxy settings".to_string(),
                remediation_steps: vec!["unset HTTPS_PROXY".to_string()],
                confidence: 0.9,
            },
            AdvisorSuggestion {
                error_kind: ErrorKind::PathError,
                description: "Install the module".to_string(),
                remediation_steps: vec![],
                confidence: 0.4,
            },
        ]);
        let planner = planner().with_advisor(Arc::new(advisor));
        let plan = planner.plan_with_advice(&client(), &errors(), "log");

        assert_eq!(plan.fixes.len(), 3);
        assert_eq!(plan.fixes[0].confidence, Some(0.4));
        assert_eq!(plan.fixes[2].for_error.kind, ErrorKind::NetworkError);
        assert!(!plan.fixes[2].automatic);
        assert!(!plan.fixes[2].is_applicable());
        assert_eq!(plan.fixes[2].remediation, vec!["unset HTTPS_PROXY"]);
    }

    #[test]
    fn test_broken_advisor_degrades_to_templates() {
        let planner = planner().with_advisor(Arc::new(BrokenAdvisor));
        let advised = planner.plan_with_advice(&client(), &errors(), "log");
        let plain = planner.plan(&client(), &errors());
        assert_eq!(advised, plain);
    }
}
