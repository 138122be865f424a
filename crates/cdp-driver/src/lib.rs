//! Chrome DevTools Protocol driver for imgur-sweep.
//!
//! Launches a local Chrome/Chromium with a persistent profile, attaches to a
//! single page over raw CDP and exposes the handful of operations the sweep
//! needs: navigation, script evaluation, text-addressed clicking and session
//! storage transfer.

use std::{env, path::PathBuf};

use which::which;

pub mod config;
pub mod driver;
pub mod error;
pub mod storage;
pub mod transport;
mod util;

pub use config::{DriverConfig, DEFAULT_USER_AGENT};
pub use driver::{ChromeDriver, Element, PageDriver};
pub use error::{DriverError, DriverErrorKind};
pub use storage::{Cookie, CookieParam, LocalStorageEntry, OriginState, StorageState};
pub use transport::{CdpTransport, CommandTarget, TransportEvent};

/// Locates a Chrome/Chromium binary: `IMGUR_SWEEP_CHROME` first, then the
/// `PATH`, then well-known install locations (unless
/// `IMGUR_SWEEP_SKIP_OS_PATHS` is set).
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("IMGUR_SWEEP_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var("IMGUR_SWEEP_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);

    if !skip_defaults {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for root in windows_search_roots() {
            paths.push(root.join("Google/Chrome/Application/chrome.exe"));
            paths.push(root.join("Chromium/Application/chrome.exe"));
            paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "windows")]
fn windows_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                roots.push(PathBuf::from(trimmed));
            }
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::{chrome_executable_names, detect_chrome_executable};
    use std::sync::Mutex;
    use std::{env, fs};
    use tempfile::tempdir;

    // Both tests mutate process-wide env vars.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn detects_from_env_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var("IMGUR_SWEEP_CHROME").ok();
        env::set_var("IMGUR_SWEEP_CHROME", exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        if let Some(value) = original {
            env::set_var("IMGUR_SWEEP_CHROME", value);
        } else {
            env::remove_var("IMGUR_SWEEP_CHROME");
        }
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn detects_from_path_entries() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let name = chrome_executable_names()
            .get(0)
            .expect("chrome executable names must not be empty");
        let exe_path = dir.path().join(name);
        fs::write(&exe_path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o755);
            fs::set_permissions(&exe_path, perms).unwrap();
        }
        let original_path = env::var("PATH").ok();
        let original_env = env::var("IMGUR_SWEEP_CHROME").ok();
        let skip_flag = env::var("IMGUR_SWEEP_SKIP_OS_PATHS").ok();
        env::set_var("IMGUR_SWEEP_CHROME", "");
        env::set_var("IMGUR_SWEEP_SKIP_OS_PATHS", "1");
        env::set_var("PATH", dir.path());
        let detected = detect_chrome_executable();
        if let Some(value) = original_path {
            env::set_var("PATH", value);
        }
        if let Some(value) = original_env {
            env::set_var("IMGUR_SWEEP_CHROME", value);
        } else {
            env::remove_var("IMGUR_SWEEP_CHROME");
        }
        if let Some(value) = skip_flag {
            env::set_var("IMGUR_SWEEP_SKIP_OS_PATHS", value);
        } else {
            env::remove_var("IMGUR_SWEEP_SKIP_OS_PATHS");
        }
        assert_eq!(detected, Some(exe_path));
    }
}
