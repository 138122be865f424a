use crate::detect_chrome_executable;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Realistic desktop user agent matching the pinned Chrome major version.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for launching and tuning the driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub default_deadline_ms: u64,
    pub nav_deadline_ms: u64,
    pub retry_backoff_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub websocket_url: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: default_chrome_path(),
            user_data_dir: default_profile_dir(),
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_width: 1920,
            window_height: 1080,
            default_deadline_ms: 30_000,
            nav_deadline_ms: 30_000,
            retry_backoff_ms: 250,
            heartbeat_interval_ms: 15_000,
            websocket_url: None,
        }
    }
}

fn default_chrome_path() -> PathBuf {
    detect_chrome_executable().unwrap_or_default()
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("IMGUR_SWEEP_PROFILE") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    PathBuf::from("./.imgur-sweep-profile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = DriverConfig::default();
        assert!(!cfg.headless);
        assert_eq!(cfg.window_width, 1920);
        assert_eq!(cfg.window_height, 1080);
        assert_eq!(cfg.default_deadline_ms, 30_000);
        assert!(cfg.user_agent.contains("Chrome/120"));
        assert!(cfg.websocket_url.is_none());
    }
}
