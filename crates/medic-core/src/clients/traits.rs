//! Client backend trait definition.

use std::path::PathBuf;

use crate::clients::types::ClientKind;
use crate::platform::HostContext;

/// Trait defining the interface for client backends.
///
/// Each supported client (Claude Desktop, Cursor, Windsurf) implements this
/// trait to describe where it keeps its helper-server configuration and logs.
pub trait ClientBackend: Send + Sync {
    fn kind(&self) -> ClientKind;

    /// The display name for this client (e.g., "Claude Desktop").
    fn display_name(&self) -> &'static str;

    /// Process name patterns used to decide whether the client is running.
    fn process_patterns(&self) -> Vec<String>;

    /// Candidate configuration file paths, most preferred first.
    ///
    /// Detection picks the first candidate that exists.
    fn config_candidates(&self, host: &HostContext) -> Vec<PathBuf>;

    /// Directories holding helper-process logs, most preferred first.
    fn log_dirs(&self, host: &HostContext) -> Vec<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    struct MockBackend;

    impl ClientBackend for MockBackend {
        fn kind(&self) -> ClientKind {
            ClientKind::Custom
        }

        fn display_name(&self) -> &'static str {
            "Mock Client"
        }

        fn process_patterns(&self) -> Vec<String> {
            vec!["mock".to_string()]
        }

        fn config_candidates(&self, host: &HostContext) -> Vec<PathBuf> {
            vec![host.home.join("mock.json")]
        }

        fn log_dirs(&self, host: &HostContext) -> Vec<PathBuf> {
            vec![host.home.join("logs")]
        }
    }

    #[test]
    fn test_client_backend_is_object_safe() {
        let backend: Box<dyn ClientBackend> = Box::new(MockBackend);
        let host = HostContext::with_home(Platform::Linux, "/home/u");
        assert_eq!(backend.display_name(), "Mock Client");
        assert_eq!(
            backend.config_candidates(&host),
            vec![PathBuf::from("/home/u/mock.json")]
        );
    }
}
