//! Rule-based classification of helper-process log lines.
//!
//! Rules are tried in table order and the first match wins, so a more
//! specific pattern must be placed ahead of a generic one.

use regex::{Captures, Regex};
use tracing::warn;

use crate::config::{DiagnosticsConfig, RuleConfig};
use crate::diagnostics::types::{ClassifiedError, ErrorKind};

pub const SHAPE_COMMAND_NOT_FOUND: &str = "command_not_found";
pub const SHAPE_PERMISSION_DENIED: &str = "permission_denied";
pub const SHAPE_MODULE_NOT_FOUND: &str = "module_not_found";
pub const SHAPE_FILE_NOT_FOUND: &str = "file_not_found";
pub const SHAPE_ENV_MISSING: &str = "env_missing";
pub const SHAPE_CONFIG_INVALID_JSON: &str = "config_invalid_json";
pub const SHAPE_NETWORK: &str = "network";
pub const SHAPE_PROCESS_EXITED: &str = "process_exited";
pub const SHAPE_CUSTOM: &str = "custom";

/// Placeholder in message templates replaced by the captured subject.
const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// One entry of the classification table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pattern: Regex,
    pub kind: ErrorKind,
    pub message_template: String,
    pub fixable: bool,
    pub shape: String,
}

impl ClassificationRule {
    /// Build a rule. Matching is always case-insensitive.
    pub fn new(
        pattern: &str,
        kind: ErrorKind,
        message_template: impl Into<String>,
        fixable: bool,
        shape: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            kind,
            message_template: message_template.into(),
            fixable,
            shape: shape.into(),
        })
    }

    pub fn from_config(rule: &RuleConfig) -> Result<Self, regex::Error> {
        Self::new(
            &rule.pattern,
            rule.kind,
            rule.message.clone(),
            rule.fixable,
            SHAPE_CUSTOM,
        )
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    fn classify(&self, line: &str) -> Option<ClassifiedError> {
        let captures = self.pattern.captures(line)?;
        let subject = first_capture(&captures);
        let message = match &subject {
            Some(s) => self.message_template.replace(SUBJECT_PLACEHOLDER, s),
            None => self.message_template.replace(SUBJECT_PLACEHOLDER, "unknown"),
        };
        Some(ClassifiedError {
            kind: self.kind,
            message,
            raw_evidence: line.to_string(),
            shape: self.shape.clone(),
            subject,
            helper: None,
            client: None,
            fixable: self.fixable,
        })
    }
}

/// First participating capture group, stripped of surrounding quotes.
fn first_capture(captures: &Captures<'_>) -> Option<String> {
    captures
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\'' || c == '`'))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Built-in rule table: `(pattern, kind, message, fixable, shape)`.
const BUILTIN_RULES: &[(&str, ErrorKind, &str, bool, &str)] = &[
    (
        r#"spawn\s+(\S+?)\s+ENOENT"#,
        ErrorKind::PathError,
        "Command \"{subject}\" not found in PATH",
        true,
        SHAPE_COMMAND_NOT_FOUND,
    ),
    (
        r#"(?:([\w.\-/]+):\s*command not found(?:\s*$|[^:])|command not found:\s*([\w.\-/]+))"#,
        ErrorKind::PathError,
        "Command \"{subject}\" not found in PATH",
        true,
        SHAPE_COMMAND_NOT_FOUND,
    ),
    (
        r#"(?:EACCES|permission denied)(?:.*?,\s*\w+\s+['"]([^'"]+)['"])?"#,
        ErrorKind::PermissionError,
        "Permission denied",
        true,
        SHAPE_PERMISSION_DENIED,
    ),
    (
        r#"Cannot find module\s+['"]([^'"]+)['"]"#,
        ErrorKind::PathError,
        "Module \"{subject}\" not found",
        true,
        SHAPE_MODULE_NOT_FOUND,
    ),
    (
        r#"ENOENT:?\s*no such file or directory,?\s*(?:\w+\s+)?['"]([^'"]+)['"]"#,
        ErrorKind::PathError,
        "File not found: {subject}",
        false,
        SHAPE_FILE_NOT_FOUND,
    ),
    (
        r#"(?:(?:environment variable|env var)\s+['"]?([A-Z_][A-Z0-9_]*)['"]?\s+(?:is\s+)?(?:not set|missing|required|undefined)|missing (?:required )?environment variable:?\s*['"]?([A-Z_][A-Z0-9_]*))"#,
        ErrorKind::EnvironmentError,
        "Environment variable \"{subject}\" is not set",
        true,
        SHAPE_ENV_MISSING,
    ),
    (
        r#"(?:Unexpected token .* in JSON|Unexpected end of JSON input|SyntaxError:.*JSON|invalid json)"#,
        ErrorKind::ConfigError,
        "Invalid JSON in configuration",
        false,
        SHAPE_CONFIG_INVALID_JSON,
    ),
    (
        r#"(?:ECONNREFUSED|ECONNRESET|ETIMEDOUT|ENOTFOUND|getaddrinfo|network timeout)"#,
        ErrorKind::NetworkError,
        "Network connection failed",
        false,
        SHAPE_NETWORK,
    ),
    (
        r#"(?:Server disconnected|exited with code\s+(-?\d+)|Server transport closed unexpectedly|crashed)"#,
        ErrorKind::ProcessError,
        "Helper process exited unexpectedly",
        false,
        SHAPE_PROCESS_EXITED,
    ),
];

/// Ordered table of classification rules.
#[derive(Debug, Clone)]
pub struct LogClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LogClassifier {
    /// A classifier with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// A classifier loaded with the built-in rule table.
    pub fn with_defaults() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(pattern, kind, message, fixable, shape)| {
                match ClassificationRule::new(pattern, *kind, *message, *fixable, *shape) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        warn!(
                            event = "core.diagnostics.builtin_rule_invalid",
                            shape = shape,
                            error = %e
                        );
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    /// Built-in rules plus the rules of a `[diagnostics]` config section.
    ///
    /// Config is validated on load, so a rule that still fails to compile
    /// is skipped with a warning.
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let mut classifier = Self::with_defaults();
        let mut prepended = Vec::new();
        for rule_config in &config.rules {
            match ClassificationRule::from_config(rule_config) {
                Ok(rule) if rule_config.prepend => prepended.push(rule),
                Ok(rule) => classifier.register(rule),
                Err(e) => warn!(
                    event = "core.diagnostics.custom_rule_invalid",
                    pattern = %rule_config.pattern,
                    error = %e
                ),
            }
        }
        // Keep the configured order among prepended rules.
        for rule in prepended.into_iter().rev() {
            classifier.prepend(rule);
        }
        classifier
    }

    /// Append a rule; it is tried after every existing rule.
    pub fn register(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    /// Insert a rule ahead of every existing rule.
    pub fn prepend(&mut self, rule: ClassificationRule) {
        self.rules.insert(0, rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a single line. Blank lines and unmatched lines yield `None`.
    pub fn classify_line(&self, line: &str) -> Option<ClassifiedError> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.rules.iter().find_map(|rule| rule.classify(line))
    }

    /// Classify every line, producing at most one record per line.
    pub fn analyze<I, S>(&self, lines: I, helper: Option<&str>) -> Vec<ClassifiedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.classify_line(line.as_ref()))
            .map(|error| error.for_helper(helper))
            .collect()
    }
}
