use std::{fs, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use tracing::warn;

const SETTINGS_FILE: &str = "field_sync.toml";

/// What to render when a listing request fails for the current category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the previous options in place.
    #[default]
    KeepPrevious,
    /// Fall back to the sentinel alone.
    ResetToSentinel,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_previous" => Ok(Self::KeepPrevious),
            "reset_to_sentinel" => Ok(Self::ResetToSentinel),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub base_url: String,
    pub domain: String,
    pub category_control: String,
    pub subcategory_control: String,
    pub sentinel_label: String,
    pub bind_retry_interval: Duration,
    /// `None` waits for the controls indefinitely.
    pub bind_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            domain: "dds".into(),
            category_control: "id_category".into(),
            subcategory_control: "id_subcategory".into(),
            sentinel_label: "---------".into(),
            bind_retry_interval: Duration::from_millis(100),
            bind_timeout: None,
            request_timeout: Duration::from_secs(10),
            failure_policy: FailurePolicy::KeepPrevious,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    base_url: Option<String>,
    domain: Option<String>,
    category_control: Option<String>,
    subcategory_control: Option<String>,
    sentinel_label: Option<String>,
    bind_retry_ms: Option<u64>,
    bind_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    failure_policy: Option<FailurePolicy>,
}

pub fn load_settings() -> SyncSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file at `path` if readable, then `APP__*`
/// variables looked up through `env`.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> SyncSettings {
    let mut settings = SyncSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<SettingsFile>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable settings file")
            }
        }
    }

    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__DOMAIN") {
        settings.domain = v;
    }
    if let Some(v) = env("APP__CATEGORY_CONTROL") {
        settings.category_control = v;
    }
    if let Some(v) = env("APP__SUBCATEGORY_CONTROL") {
        settings.subcategory_control = v;
    }
    if let Some(v) = env("APP__SENTINEL_LABEL") {
        settings.sentinel_label = v;
    }
    if let Some(ms) = parse_env::<u64>(&env, "APP__BIND_RETRY_MS") {
        settings.bind_retry_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_env::<u64>(&env, "APP__BIND_TIMEOUT_MS") {
        settings.bind_timeout = bind_timeout(ms);
    }
    if let Some(ms) = parse_env::<u64>(&env, "APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout = Duration::from_millis(ms);
    }
    if let Some(policy) = parse_env::<FailurePolicy>(&env, "APP__FAILURE_POLICY") {
        settings.failure_policy = policy;
    }

    settings
}

fn apply_file(settings: &mut SyncSettings, file_cfg: SettingsFile) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.domain {
        settings.domain = v;
    }
    if let Some(v) = file_cfg.category_control {
        settings.category_control = v;
    }
    if let Some(v) = file_cfg.subcategory_control {
        settings.subcategory_control = v;
    }
    if let Some(v) = file_cfg.sentinel_label {
        settings.sentinel_label = v;
    }
    if let Some(ms) = file_cfg.bind_retry_ms {
        settings.bind_retry_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.bind_timeout_ms {
        settings.bind_timeout = bind_timeout(ms);
    }
    if let Some(ms) = file_cfg.request_timeout_ms {
        settings.request_timeout = Duration::from_millis(ms);
    }
    if let Some(policy) = file_cfg.failure_policy {
        settings.failure_policy = policy;
    }
}

// 0 means "no deadline".
fn bind_timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, value = %raw, %error, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
