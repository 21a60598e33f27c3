//! Configuration management module
//!
//! Layers, lowest to highest precedence: defaults, a JSON or YAML file, the
//! `WHATSWEB_*` environment variables. CLI flags are applied by the binary.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cdp_adapter::CdpConfig;
use perceiver_structural::LOOP_INTERVAL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ClientError, ClientResult};

pub const ENV_HEADLESS: &str = "WHATSWEB_HEADLESS";
pub const ENV_PROFILE: &str = "WHATSWEB_PROFILE";
pub const ENV_CHROME: &str = "WHATSWEB_CHROME";
pub const ENV_POLL_INTERVAL: &str = "WHATSWEB_POLL_INTERVAL";
pub const ENV_DEBUG: &str = "WHATSWEB_DEBUG";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub browser: CdpConfig,
    /// Tick of the poll loop, e.g. `"500ms"`.
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
    /// Log reported errors and save a screenshot for each.
    pub debug: bool,
    /// Render the login QR code on stdout.
    pub print_qr: bool,
    pub debug_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            browser: CdpConfig::default(),
            poll_interval: LOOP_INTERVAL,
            debug: false,
            print_qr: true,
            debug_dir: PathBuf::from("debug"),
        }
    }
}

impl ClientConfig {
    /// Defaults, then `path` when given, then the environment.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Reads a `.json` file with serde_json and anything else as YAML.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ClientError::config(format!("reading {}: {err}", path.display())))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(|err| err.to_string())
        } else {
            serde_yaml::from_str(&raw).map_err(|err| err.to_string())
        };
        debug!(path = %path.display(), "Loaded configuration file");
        parsed.map_err(|err| ClientError::config(format!("parsing {}: {err}", path.display())))
    }

    pub fn apply_env(&mut self) -> ClientResult<()> {
        if let Some(raw) = env_value(ENV_HEADLESS) {
            self.browser.headless = parse_flag(ENV_HEADLESS, &raw)?;
        }
        if let Some(raw) = env_value(ENV_PROFILE) {
            self.browser.user_data_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_value(ENV_CHROME) {
            self.browser.executable = PathBuf::from(raw);
        }
        if let Some(raw) = env_value(ENV_POLL_INTERVAL) {
            self.poll_interval = humantime::parse_duration(&raw)
                .map_err(|err| ClientError::config(format!("{ENV_POLL_INTERVAL}={raw}: {err}")))?;
        }
        if let Some(raw) = env_value(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, &raw)?;
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::config("poll_interval must be greater than zero"));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_flag(key: &str, raw: &str) -> ClientResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::config(format!("{key}={raw}: expected a boolean"))),
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
