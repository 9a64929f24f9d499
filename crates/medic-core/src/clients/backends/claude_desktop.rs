//! Claude Desktop client backend implementation.

use std::path::PathBuf;

use crate::clients::traits::ClientBackend;
use crate::clients::types::ClientKind;
use crate::platform::{HostContext, Platform};

const CONFIG_FILE: &str = "claude_desktop_config.json";

/// Backend implementation for Claude Desktop.
pub struct ClaudeDesktopBackend;

impl ClientBackend for ClaudeDesktopBackend {
    fn kind(&self) -> ClientKind {
        ClientKind::ClaudeDesktop
    }

    fn display_name(&self) -> &'static str {
        "Claude Desktop"
    }

    fn process_patterns(&self) -> Vec<String> {
        vec!["Claude".to_string(), "claude-desktop".to_string()]
    }

    fn config_candidates(&self, host: &HostContext) -> Vec<PathBuf> {
        let mut candidates = vec![app_dir(host).join(CONFIG_FILE)];
        if let Some(roaming) = host.compat_app_data_dir() {
            candidates.push(roaming.join("Claude").join(CONFIG_FILE));
        }
        candidates
    }

    fn log_dirs(&self, host: &HostContext) -> Vec<PathBuf> {
        let mut dirs = match host.platform {
            Platform::MacOs => vec![host.home.join("Library").join("Logs").join("Claude")],
            Platform::Windows | Platform::Linux => vec![app_dir(host).join("logs")],
        };
        if let Some(roaming) = host.compat_app_data_dir() {
            dirs.push(roaming.join("Claude").join("logs"));
        }
        dirs
    }
}

fn app_dir(host: &HostContext) -> PathBuf {
    match host.platform {
        Platform::MacOs => host
            .home
            .join("Library")
            .join("Application Support")
            .join("Claude"),
        Platform::Windows => host.app_data_dir().join("Claude"),
        Platform::Linux => host.home.join(".config").join("Claude"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_desktop_macos_paths() {
        let host = HostContext::with_home(Platform::MacOs, "/Users/u");
        let backend = ClaudeDesktopBackend;
        assert_eq!(
            backend.config_candidates(&host),
            vec![PathBuf::from(
                "/Users/u/Library/Application Support/Claude/claude_desktop_config.json"
            )]
        );
        assert_eq!(
            backend.log_dirs(&host),
            vec![PathBuf::from("/Users/u/Library/Logs/Claude")]
        );
    }

    #[test]
    fn test_claude_desktop_linux_paths() {
        let host = HostContext::with_home(Platform::Linux, "/home/u");
        let backend = ClaudeDesktopBackend;
        assert_eq!(
            backend.config_candidates(&host)[0],
            PathBuf::from("/home/u/.config/Claude/claude_desktop_config.json")
        );
        assert_eq!(
            backend.log_dirs(&host)[0],
            PathBuf::from("/home/u/.config/Claude/logs")
        );
    }

    #[test]
    fn test_claude_desktop_wsl_fallback() {
        let mut host = HostContext::with_home(Platform::Linux, "/home/u");
        host.compat_home = Some(PathBuf::from("/mnt/c/Users/U"));
        let candidates = ClaudeDesktopBackend.config_candidates(&host);
        assert_eq!(candidates.len(), 2);
        assert_eq!(
            candidates[1],
            PathBuf::from("/mnt/c/Users/U/AppData/Roaming/Claude/claude_desktop_config.json")
        );
    }

    #[test]
    fn test_claude_desktop_windows_uses_app_data() {
        let host = HostContext::with_home(Platform::Windows, "/c/Users/u");
        let candidates = ClaudeDesktopBackend.config_candidates(&host);
        assert!(candidates[0].ends_with("AppData/Roaming/Claude/claude_desktop_config.json"));
    }
}
