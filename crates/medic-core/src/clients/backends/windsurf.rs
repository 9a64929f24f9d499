//! Windsurf client backend implementation.

use std::path::PathBuf;

use crate::clients::traits::ClientBackend;
use crate::clients::types::ClientKind;
use crate::platform::HostContext;

/// Backend implementation for Windsurf.
pub struct WindsurfBackend;

impl ClientBackend for WindsurfBackend {
    fn kind(&self) -> ClientKind {
        ClientKind::Windsurf
    }

    fn display_name(&self) -> &'static str {
        "Windsurf"
    }

    fn process_patterns(&self) -> Vec<String> {
        vec!["Windsurf".to_string()]
    }

    fn config_candidates(&self, host: &HostContext) -> Vec<PathBuf> {
        let mut candidates = vec![codeium_dir(&host.home).join("mcp_config.json")];
        if let Some(compat) = &host.compat_home {
            candidates.push(codeium_dir(compat).join("mcp_config.json"));
        }
        candidates
    }

    fn log_dirs(&self, host: &HostContext) -> Vec<PathBuf> {
        vec![codeium_dir(&host.home).join("logs")]
    }
}

fn codeium_dir(home: &std::path::Path) -> PathBuf {
    home.join(".codeium").join("windsurf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_windsurf_paths() {
        let host = HostContext::with_home(Platform::MacOs, "/Users/u");
        assert_eq!(
            WindsurfBackend.config_candidates(&host),
            vec![PathBuf::from("/Users/u/.codeium/windsurf/mcp_config.json")]
        );
        assert_eq!(
            WindsurfBackend.log_dirs(&host),
            vec![PathBuf::from("/Users/u/.codeium/windsurf/logs")]
        );
    }
}
