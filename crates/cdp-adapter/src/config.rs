use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use which::which;

/// Configuration for reaching the browser a plan runs against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Chrome/Chromium binary; detected when empty
    pub executable: Option<PathBuf>,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub no_sandbox: bool,
    /// DevTools websocket of an already running (and logged-in) browser
    pub websocket_url: Option<String>,
    /// Page opened when the browser has no usable tab
    pub start_url: Option<String>,
    pub request_timeout_ms: u64,
    pub launch_timeout_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: PathBuf::from("./.stepwise-profile"),
            headless: true,
            no_sandbox: false,
            websocket_url: None,
            start_url: None,
            request_timeout_ms: 30_000,
            launch_timeout_ms: 20_000,
        }
    }
}

impl CdpConfig {
    /// Executable to launch: the configured one when it exists, otherwise a detected one.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        match &self.executable {
            Some(path) if !path.as_os_str().is_empty() && path.exists() => Some(path.clone()),
            _ => detect_chrome_executable(),
        }
    }
}

pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("STEPWISE_CHROME") {
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

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
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

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_names_are_not_empty() {
        assert!(!chrome_executable_names().is_empty());
    }

    #[test]
    fn missing_configured_executable_falls_back_to_detection() {
        let cfg = CdpConfig {
            executable: Some(PathBuf::from("/definitely/not/a/chrome")),
            ..CdpConfig::default()
        };
        assert_eq!(cfg.resolve_executable(), detect_chrome_executable());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: CdpConfig = serde_json::from_str(r#"{"headless": false}"#).unwrap();
        assert!(!cfg.headless);
        assert_eq!(cfg.request_timeout_ms, 30_000);
        assert!(cfg.websocket_url.is_none());
    }
}
