//! Binary decision tree for root-cause isolation.

use tracing::info;

use crate::diagnostics::ErrorKind;
use crate::diagnostics::classifier::{
    SHAPE_COMMAND_NOT_FOUND, SHAPE_ENV_MISSING, SHAPE_FILE_NOT_FOUND, SHAPE_NETWORK,
    SHAPE_PERMISSION_DENIED,
};
use crate::isolation::probes::{Probe, ProbeContext, ProbeOutcome};
use crate::isolation::types::{IsolationResult, Traversal};

/// Shape of the leaf reached when every probe passes.
pub const SHAPE_CLEAR: &str = "clear";

/// A leaf template. `{subject}` in the description is replaced by what the
/// last failing probe named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub fault: bool,
    pub kind: ErrorKind,
    pub description: String,
    pub fixable: bool,
    pub shape: String,
}

impl Verdict {
    pub fn fault(
        kind: ErrorKind,
        description: impl Into<String>,
        fixable: bool,
        shape: impl Into<String>,
    ) -> Self {
        Self {
            fault: true,
            kind,
            description: description.into(),
            fixable,
            shape: shape.into(),
        }
    }

    pub fn clear() -> Self {
        Self {
            fault: false,
            kind: ErrorKind::UnknownError,
            description: "No fault found".to_string(),
            fixable: false,
            shape: SHAPE_CLEAR.to_string(),
        }
    }

    fn resolve(&self, helper: &str, last_failure: Option<&ProbeOutcome>) -> IsolationResult {
        let subject = last_failure.and_then(|o| o.subject.clone());
        IsolationResult {
            fault: self.fault,
            kind: self.kind,
            description: self
                .description
                .replace("{subject}", subject.as_deref().unwrap_or("unknown")),
            raw_evidence: last_failure
                .map(|o| o.evidence.clone())
                .unwrap_or_else(|| "all probes passed".to_string()),
            fixable: self.fixable,
            shape: self.shape.clone(),
            subject: if self.fault { subject } else { None },
            helper: Some(helper.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DecisionNode {
    Branch {
        probe: Probe,
        on_true: Box<DecisionNode>,
        on_false: Box<DecisionNode>,
    },
    Leaf(Verdict),
}

impl DecisionNode {
    pub fn branch(probe: Probe, on_true: DecisionNode, on_false: DecisionNode) -> Self {
        DecisionNode::Branch {
            probe,
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        }
    }

    /// Longest number of probes on any root-to-leaf path.
    pub fn depth(&self) -> usize {
        match self {
            DecisionNode::Leaf(_) => 0,
            DecisionNode::Branch {
                on_true, on_false, ..
            } => 1 + on_true.depth().max(on_false.depth()),
        }
    }

    /// Walk from this node to a leaf, running one probe per branch.
    pub fn traverse(&self, ctx: &ProbeContext<'_>) -> Traversal {
        let mut node = self;
        let mut probes_run = 0;
        let mut last_failure: Option<ProbeOutcome> = None;

        loop {
            match node {
                DecisionNode::Leaf(verdict) => {
                    let result = verdict.resolve(&ctx.helper.name, last_failure.as_ref());
                    info!(
                        event = "core.isolation.traverse_completed",
                        helper = %ctx.helper.name,
                        fault = result.fault,
                        kind = %result.kind,
                        probes_run = probes_run
                    );
                    return Traversal { result, probes_run };
                }
                DecisionNode::Branch {
                    probe,
                    on_true,
                    on_false,
                } => {
                    let outcome = probe.run(ctx);
                    probes_run += 1;
                    if outcome.passed {
                        node = &**on_true;
                    } else {
                        last_failure = Some(outcome);
                        node = &**on_false;
                    }
                }
            }
        }
    }
}

/// The standard per-helper tree:
/// resolvable → executable → scripts exist → env present → endpoints reachable → clear.
pub fn standard_tree() -> DecisionNode {
    let reachable = DecisionNode::branch(
        Probe::EndpointsReachable,
        DecisionNode::Leaf(Verdict::clear()),
        DecisionNode::Leaf(Verdict::fault(
            ErrorKind::NetworkError,
            "Cannot reach {subject}",
            false,
            SHAPE_NETWORK,
        )),
    );
    let env = DecisionNode::branch(
        Probe::EnvValuesPresent,
        reachable,
        DecisionNode::Leaf(Verdict::fault(
            ErrorKind::EnvironmentError,
            "Environment variable \"{subject}\" is not set",
            true,
            SHAPE_ENV_MISSING,
        )),
    );
    let scripts = DecisionNode::branch(
        Probe::ScriptArgsExist,
        env,
        DecisionNode::Leaf(Verdict::fault(
            ErrorKind::PathError,
            "File not found: {subject}",
            false,
            SHAPE_FILE_NOT_FOUND,
        )),
    );
    let executable = DecisionNode::branch(
        Probe::CommandExecutable,
        scripts,
        DecisionNode::Leaf(Verdict::fault(
            ErrorKind::PermissionError,
            "Permission denied",
            true,
            SHAPE_PERMISSION_DENIED,
        )),
    );
    DecisionNode::branch(
        Probe::CommandResolvable,
        executable,
        DecisionNode::Leaf(Verdict::fault(
            ErrorKind::PathError,
            "Command \"{subject}\" not found in PATH",
            true,
            SHAPE_COMMAND_NOT_FOUND,
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HelperProcess;
    use std::ffi::OsString;
    use std::time::Duration;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn ctx<'a>(helper: &'a HelperProcess, path: &TempDir) -> ProbeContext<'a> {
        ProbeContext::new(helper, TIMEOUT).with_search_path(OsString::from(path.path()))
    }

    #[cfg(unix)]
    fn install(dir: &TempDir, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_standard_tree_depth() {
        assert_eq!(standard_tree().depth(), 5);
    }

    #[test]
    fn test_missing_command_stops_after_one_probe() {
        let dir = TempDir::new().unwrap();
        let helper = HelperProcess::new("fs", "npx");
        let traversal = standard_tree().traverse(&ctx(&helper, &dir));

        assert_eq!(traversal.probes_run, 1);
        let result = traversal.result;
        assert!(result.fault);
        assert_eq!(result.kind, ErrorKind::PathError);
        assert_eq!(result.description, "Command \"npx\" not found in PATH");
        assert_eq!(result.subject.as_deref(), Some("npx"));
        assert_eq!(result.helper.as_deref(), Some("fs"));
        assert!(result.fixable);
    }

    #[cfg(unix)]
    #[test]
    fn test_placeholder_env_is_environment_error() {
        let dir = TempDir::new().unwrap();
        install(&dir, "node");
        let helper = HelperProcess::new("gh", "node").with_env("GITHUB_TOKEN", "<token>");
        let traversal = standard_tree().traverse(&ctx(&helper, &dir));

        assert_eq!(traversal.probes_run, 4);
        assert_eq!(traversal.result.kind, ErrorKind::EnvironmentError);
        assert_eq!(
            traversal.result.description,
            "Environment variable \"GITHUB_TOKEN\" is not set"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_healthy_helper_reaches_clear_leaf() {
        let dir = TempDir::new().unwrap();
        install(&dir, "uvx");
        let helper = HelperProcess::new("git", "uvx").with_args(["mcp-server-git"]);
        let traversal = standard_tree().traverse(&ctx(&helper, &dir));

        assert_eq!(traversal.probes_run, 5);
        assert!(!traversal.result.fault);
        assert!(traversal.result.to_error(None).is_none());
    }

    #[test]
    fn test_traversal_never_exceeds_depth() {
        let dir = TempDir::new().unwrap();
        let tree = standard_tree();
        for helper in [
            HelperProcess::new("a", "missing"),
            HelperProcess::new("b", "/bin/sh").with_args(["/nope/x.js"]),
            HelperProcess::new("c", "/bin/sh").with_env("K", ""),
        ] {
            let traversal = tree.traverse(&ctx(&helper, &dir));
            assert!(traversal.probes_run <= tree.depth());
        }
    }

    #[test]
    fn test_custom_tree_with_closure_probe() {
        let tree = DecisionNode::branch(
            Probe::custom("has_args", |h| !h.args.is_empty()),
            DecisionNode::Leaf(Verdict::clear()),
            DecisionNode::Leaf(Verdict::fault(
                ErrorKind::ConfigError,
                "No arguments configured",
                false,
                "no_args",
            )),
        );
        let helper = HelperProcess::new("x", "node");
        let traversal = tree.traverse(&ProbeContext::new(&helper, TIMEOUT));
        assert_eq!(traversal.probes_run, 1);
        assert_eq!(traversal.result.shape, "no_args");
        let error = traversal.result.to_error(None).unwrap();
        assert_eq!(error.kind, ErrorKind::ConfigError);
    }
}
