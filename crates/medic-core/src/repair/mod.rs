//! Repair Planner & Executor.
//!
//! - [`templates`] - predefined fixes keyed by error kind and message shape
//! - [`planner`] - builds a [`RepairPlan`], optionally ranked by a [`RepairAdvisor`]
//! - [`executor`] - backup, apply, verify and rollback
//! - [`locks`] - per-target serialization keys shared with the backup store
//! - [`history`] - JSON Lines audit log

pub mod advisor;
pub mod errors;
pub mod executor;
pub mod history;
pub mod locks;
pub mod planner;
pub mod templates;
pub mod types;

pub use advisor::{AdvisorSuggestion, RepairAdvisor};
pub use errors::{AdvisorError, RepairError};
pub use executor::{ExecuteOptions, RepairExecutor, SystemVerifier, Verifier};
pub use history::RepairHistory;
pub use locks::{TargetGuard, TargetLocks};
pub use planner::RepairPlanner;
pub use templates::TemplateContext;
pub use types::{
    CancellationToken, ChangeAction, ChangeKind, HistoryEntry, HistoryFix, HistoryOutcome,
    RepairChange, RepairFix, RepairOutcome, RepairPlan, RepairReport, RepairState, Verification,
};
