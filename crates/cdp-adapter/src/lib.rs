//! Browser collaborator for the whatsweb kernel.
//!
//! Higher layers only see the [`Browser`] trait: DOM probes that never fail,
//! a handful of interactions, script execution and the notification queue.
//! [`ChromiumBrowser`] drives a real Chromium over CDP; the `fake` feature
//! exposes an in-memory implementation for tests.

use std::{env, path::PathBuf};

use which::which;

mod browser;
mod chromium;
#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use browser::{Browser, ElementProbe, RawNotification};
pub use chromium::{ChromiumBrowser, NOTIFICATION_HOOK};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("browser launch failed")]
        Launch,
        #[error("browser session closed")]
        SessionClosed,
        #[error("navigation failed")]
        Navigation,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("script evaluation failed")]
        Script,
        #[error("target element not found")]
        TargetNotFound,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        pub fn target_not_found(selector: &str) -> Self {
            Self::new(AdapterErrorKind::TargetNotFound).with_hint(selector.to_string())
        }

        pub fn session_closed() -> Self {
            Self::new(AdapterErrorKind::SessionClosed)
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    /// Configuration for launching the browser.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    pub struct CdpConfig {
        /// Empty lets chromiumoxide look the binary up itself.
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        pub window_width: u32,
        pub window_height: u32,
        pub launch_timeout_ms: u64,
        pub request_timeout_ms: u64,
        pub no_sandbox: bool,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: default_profile_dir(),
                headless: false,
                window_width: 1500,
                window_height: 900,
                launch_timeout_ms: 20_000,
                request_timeout_ms: 30_000,
                no_sandbox: false,
            }
        }
    }

    impl CdpConfig {
        /// Window size used by the web client layout; headless runs get a
        /// larger virtual screen so side drawers do not collapse.
        pub fn window_size(&self) -> (u32, u32) {
            if self.headless && self.window_width == 1500 && self.window_height == 900 {
                (1920, 1080)
            } else {
                (self.window_width, self.window_height)
            }
        }
    }

    pub fn default_profile_dir() -> PathBuf {
        match dirs::data_local_dir() {
            Some(base) => base.join("whatsweb").join("profile"),
            None => Path::new("./.whatsweb-profile").into(),
        }
    }
}

pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("WHATSWEB_CHROME") {
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
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
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

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
