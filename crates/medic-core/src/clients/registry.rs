//! Client registry for looking up client backends.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::backends::{ClaudeDesktopBackend, CursorBackend, WindsurfBackend};
use super::traits::ClientBackend;
use super::types::ClientKind;

/// Global registry of all built-in client backends.
static REGISTRY: LazyLock<ClientRegistry> = LazyLock::new(ClientRegistry::new);

struct ClientRegistry {
    backends: HashMap<ClientKind, Box<dyn ClientBackend>>,
}

impl ClientRegistry {
    fn new() -> Self {
        let mut backends: HashMap<ClientKind, Box<dyn ClientBackend>> = HashMap::new();
        backends.insert(ClientKind::ClaudeDesktop, Box::new(ClaudeDesktopBackend));
        backends.insert(ClientKind::Cursor, Box::new(CursorBackend));
        backends.insert(ClientKind::Windsurf, Box::new(WindsurfBackend));
        Self { backends }
    }

    fn get(&self, kind: ClientKind) -> Option<&dyn ClientBackend> {
        self.backends.get(&kind).map(|b| b.as_ref())
    }
}

/// Get the backend for a built-in client kind. `Custom` has no backend.
pub fn get_backend(kind: ClientKind) -> Option<&'static dyn ClientBackend> {
    REGISTRY.get(kind)
}

/// Names accepted for `--client` (built-in kinds plus `custom`), sorted.
pub fn valid_client_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ClientKind::builtin().iter().map(|k| k.as_str()).collect();
    names.push(ClientKind::Custom.as_str());
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_kind_has_backend() {
        for kind in ClientKind::builtin() {
            let backend = get_backend(*kind).unwrap();
            assert_eq!(backend.kind(), *kind);
        }
    }

    #[test]
    fn test_custom_has_no_backend() {
        assert!(get_backend(ClientKind::Custom).is_none());
    }

    #[test]
    fn test_valid_client_names_sorted() {
        assert_eq!(
            valid_client_names(),
            vec!["claude_desktop", "cursor", "custom", "windsurf"]
        );
    }
}
