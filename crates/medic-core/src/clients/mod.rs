//! Client inventory.
//!
//! Knows which desktop clients medic can manage, where each keeps its
//! helper-server configuration and logs, and how to read and rewrite the
//! helper-server map inside that configuration.
//!
//! # Architecture
//!
//! - [`ClientBackend`] - Trait describing one supported client
//! - [`ClientKind`] - Enum of all supported client kinds
//! - [`backends`] - Individual client implementations
//! - [`registry`] - Global registry for backend lookup
//! - [`config_file`] - Reading/writing the helper-server map
//! - [`detection`] - Host scan producing a [`DetectionReport`]

pub mod backends;
pub mod config_file;
pub mod detection;
pub mod errors;
pub mod registry;
pub mod traits;
pub mod types;

pub use detection::{
    annotate_helper_status, detect, helper_runtime_version, is_client_running, refresh_client,
    reload_clients,
};
pub use errors::ClientError;
pub use registry::{get_backend, valid_client_names};
pub use traits::ClientBackend;
pub use types::{
    ClientKind, ConfigIssue, DetectionReport, HelperProcess, HelperStatus, TargetClient, TargetKey,
};
