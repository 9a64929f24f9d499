use serde::{Deserialize, Serialize};

use crate::clients::ClientKind;
use crate::diagnostics::{ClassifiedError, ErrorKind};

/// Terminal value of a decision-tree traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationResult {
    /// False for the "all probes passed" leaf.
    pub fault: bool,
    pub kind: ErrorKind,
    pub description: String,
    pub raw_evidence: String,
    pub fixable: bool,
    pub shape: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper: Option<String>,
}

impl IsolationResult {
    /// The result as a classified record, or `None` when no fault was found.
    pub fn to_error(&self, client: Option<ClientKind>) -> Option<ClassifiedError> {
        if !self.fault {
            return None;
        }
        Some(ClassifiedError {
            kind: self.kind,
            message: self.description.clone(),
            raw_evidence: self.raw_evidence.clone(),
            shape: self.shape.clone(),
            subject: self.subject.clone(),
            helper: self.helper.clone(),
            client,
            fixable: self.fixable,
        })
    }
}

/// Outcome of a traversal together with the number of probes evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traversal {
    pub result: IsolationResult,
    pub probes_run: usize,
}
