//! Cursor client backend implementation.

use std::path::PathBuf;

use crate::clients::traits::ClientBackend;
use crate::clients::types::ClientKind;
use crate::platform::{HostContext, Platform};

/// Backend implementation for Cursor.
pub struct CursorBackend;

impl ClientBackend for CursorBackend {
    fn kind(&self) -> ClientKind {
        ClientKind::Cursor
    }

    fn display_name(&self) -> &'static str {
        "Cursor"
    }

    fn process_patterns(&self) -> Vec<String> {
        vec!["Cursor".to_string()]
    }

    fn config_candidates(&self, host: &HostContext) -> Vec<PathBuf> {
        let mut candidates = vec![host.home.join(".cursor").join("mcp.json")];
        if let Some(compat) = &host.compat_home {
            candidates.push(compat.join(".cursor").join("mcp.json"));
        }
        candidates
    }

    fn log_dirs(&self, host: &HostContext) -> Vec<PathBuf> {
        let dir = match host.platform {
            Platform::MacOs => host
                .home
                .join("Library")
                .join("Application Support")
                .join("Cursor")
                .join("logs"),
            Platform::Windows => host.app_data_dir().join("Cursor").join("logs"),
            Platform::Linux => host.home.join(".config").join("Cursor").join("logs"),
        };
        vec![dir]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_config_path_is_platform_independent() {
        for platform in [Platform::Linux, Platform::MacOs, Platform::Windows] {
            let host = HostContext::with_home(platform, "/h");
            assert_eq!(
                CursorBackend.config_candidates(&host)[0],
                PathBuf::from("/h/.cursor/mcp.json")
            );
        }
    }

    #[test]
    fn test_cursor_log_dir_linux() {
        let host = HostContext::with_home(Platform::Linux, "/h");
        assert_eq!(
            CursorBackend.log_dirs(&host),
            vec![PathBuf::from("/h/.config/Cursor/logs")]
        );
    }
}
