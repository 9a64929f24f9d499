//! Host platform detection.
//!
//! The platform is derived once and passed around inside a [`HostContext`],
//! which also carries the home directories used to resolve well-known client
//! paths. Tests build a `HostContext` pointing at a temp directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything path resolution needs to know about the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub platform: Platform,
    pub home: PathBuf,
    /// `%APPDATA%` on Windows; unused elsewhere.
    pub app_data: Option<PathBuf>,
    /// Set when running under WSL: the Windows-side user profile,
    /// e.g. `/mnt/c/Users/alice`.
    pub compat_home: Option<PathBuf>,
}

impl HostContext {
    /// Detect the context of the running host.
    pub fn detect() -> Self {
        let platform = Platform::current();
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        let app_data = match platform {
            Platform::Windows => std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .or_else(dirs::config_dir),
            _ => None,
        };
        let compat_home = if platform == Platform::Linux && is_wsl() {
            windows_home_under_wsl(Path::new("/mnt/c/Users"))
        } else {
            None
        };

        debug!(
            event = "core.platform.detect_completed",
            platform = %platform,
            home = %home.display(),
            compat = compat_home.is_some()
        );

        Self {
            platform,
            home,
            app_data,
            compat_home,
        }
    }

    /// A context rooted at `home`, used by tests and by `--home` style overrides.
    pub fn with_home(platform: Platform, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let app_data = (platform == Platform::Windows).then(|| home.join("AppData").join("Roaming"));
        Self {
            platform,
            home,
            app_data,
            compat_home: None,
        }
    }

    pub fn is_compat_layer(&self) -> bool {
        self.compat_home.is_some()
    }

    /// `%APPDATA%`, falling back to `<home>/AppData/Roaming`.
    pub fn app_data_dir(&self) -> PathBuf {
        self.app_data
            .clone()
            .unwrap_or_else(|| self.home.join("AppData").join("Roaming"))
    }

    /// Roaming app-data directory of the Windows profile seen from WSL.
    pub fn compat_app_data_dir(&self) -> Option<PathBuf> {
        self.compat_home
            .as_ref()
            .map(|h| h.join("AppData").join("Roaming"))
    }
}

/// True when running under the Windows Subsystem for Linux.
pub fn is_wsl() -> bool {
    if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        return true;
    }
    std::fs::read_to_string("/proc/version")
        .map(|v| v.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Resolve the Windows user profile directory from WSL.
///
/// Prefers a profile named like the Linux user; otherwise the first
/// non-system profile found under `users_root`.
pub fn windows_home_under_wsl(users_root: &Path) -> Option<PathBuf> {
    if let Ok(user) = std::env::var("USER") {
        let candidate = users_root.join(&user);
        if candidate.is_dir() {
            return Some(candidate);
        }
    }

    const SYSTEM_PROFILES: &[&str] = &["Public", "Default", "Default User", "All Users"];

    let mut profiles: Vec<PathBuf> = std::fs::read_dir(users_root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            !SYSTEM_PROFILES.contains(&name.as_str())
        })
        .map(|entry| entry.path())
        .collect();
    profiles.sort();
    profiles.into_iter().next()
}
