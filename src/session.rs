//! Saved-session files and username discovery.
//!
//! A session file is the cookies-plus-localStorage snapshot written by the
//! login flow. The account name is usually recoverable from it, either from
//! a `https://<name>.imgur.com` origin or from a cookie domain.

use std::fs;
use std::path::{Path, PathBuf};

use cdp_driver::StorageState;
use thiserror::Error;
use url::Url;

/// Default session file name, written next to the config.
pub const DEFAULT_STORAGE_FILE: &str = "imgur_storage_state.json";

/// Subdomains that are infrastructure, never account names.
const RESERVED_SUBDOMAINS: [&str; 4] = ["www", "i", "api", "m"];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is not valid storage state: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Lists candidate session files in `dir`: anything named like
/// `*storage*.json`, plus the well-known default names. Sorted by file name
/// so prompts are stable across runs.
pub fn find_storage_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.contains("storage") && name.ends_with(".json") {
                found.push(path);
            }
        }
    }

    for name in [DEFAULT_STORAGE_FILE, "storage_state.json"] {
        let candidate = dir.join(name);
        if candidate.is_file() && !found.contains(&candidate) {
            found.push(candidate);
        }
    }

    found.sort();
    found
}

pub fn load_storage_state(path: &Path) -> Result<StorageState, SessionError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SessionError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_storage_state(path: &Path, state: &StorageState) -> Result<(), SessionError> {
    let rendered =
        serde_json::to_string_pretty(state).map_err(|source| SessionError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, rendered).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Best-effort username recovery from a saved session. Origins win over
/// cookie domains; reserved subdomains are never usernames.
pub fn extract_username(state: &StorageState) -> Option<String> {
    for origin in &state.origins {
        if let Some(name) = username_from_origin(&origin.origin) {
            return Some(name);
        }
    }

    for cookie in &state.cookies {
        if let Some(name) = username_from_cookie_domain(&cookie.domain) {
            return Some(name);
        }
    }

    None
}

fn username_from_origin(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?;
    let subdomain = host.strip_suffix(".imgur.com")?;
    if subdomain.is_empty() || subdomain.contains('.') {
        return None;
    }
    Some(subdomain.to_string())
}

fn username_from_cookie_domain(domain: &str) -> Option<String> {
    let trimmed = domain.trim_start_matches('.');
    let prefix = trimmed.strip_suffix(".imgur.com")?;
    let label = prefix.rsplit('.').next()?;
    if label.is_empty() || RESERVED_SUBDOMAINS.contains(&label) {
        return None;
    }
    Some(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_driver::{Cookie, OriginState};
    use tempfile::tempdir;

    fn state_with_origin(origin: &str) -> StorageState {
        StorageState {
            cookies: Vec::new(),
            origins: vec![OriginState {
                origin: origin.to_string(),
                local_storage: Vec::new(),
            }],
        }
    }

    fn cookie_on(domain: &str) -> Cookie {
        Cookie {
            name: "accesstoken".into(),
            value: "v".into(),
            domain: domain.into(),
            path: "/".into(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: None,
        }
    }

    #[test]
    fn discovers_storage_files_by_pattern_and_known_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("my_storage_backup.json"), "{}").unwrap();
        fs::write(dir.path().join(DEFAULT_STORAGE_FILE), "{}").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        fs::write(dir.path().join("storage.txt"), "").unwrap();

        let found = find_storage_files(dir.path());
        let names: Vec<_> = found
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();

        assert_eq!(names, vec![DEFAULT_STORAGE_FILE, "my_storage_backup.json"]);
    }

    #[test]
    fn username_comes_from_account_origin() {
        let state = state_with_origin("https://catpics99.imgur.com");
        assert_eq!(extract_username(&state).as_deref(), Some("catpics99"));
    }

    #[test]
    fn plain_site_origin_is_not_a_username() {
        let mut state = state_with_origin("https://imgur.com");
        assert_eq!(extract_username(&state), None);

        state.cookies.push(cookie_on(".imgur.com"));
        assert_eq!(extract_username(&state), None);
    }

    #[test]
    fn cookie_domain_fallback_skips_reserved_subdomains() {
        let state = StorageState {
            cookies: vec![cookie_on("www.imgur.com"), cookie_on("catpics99.imgur.com")],
            origins: Vec::new(),
        };
        assert_eq!(extract_username(&state).as_deref(), Some("catpics99"));
    }

    #[test]
    fn storage_round_trip_preserves_cookies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_STORAGE_FILE);
        let state = StorageState {
            cookies: vec![cookie_on(".imgur.com")],
            origins: Vec::new(),
        };

        save_storage_state(&path, &state).unwrap();
        let loaded = load_storage_state(&path).unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.cookies[0].name, "accesstoken");
    }
}
