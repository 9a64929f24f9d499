//! Root-Cause Isolator.
//!
//! Active probing used when log evidence is missing or ambiguous. The
//! [`standard_tree`] is built once per traversal and probes only read state.

pub mod probes;
pub mod tree;
pub mod types;

pub use probes::{Probe, ProbeContext, ProbeOutcome};
pub use tree::{DecisionNode, Verdict, standard_tree};
pub use types::{IsolationResult, Traversal};
