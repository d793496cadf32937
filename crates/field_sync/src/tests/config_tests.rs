use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_settings_file(contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("field_sync_settings_{suffix}.toml"));
    fs::write(&path, contents).expect("write settings");
    path
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_match_admin_form_layout() {
    let settings = load_settings_from(Path::new("/nonexistent/field_sync.toml"), |_| None);
    assert_eq!(settings.category_control, "id_category");
    assert_eq!(settings.subcategory_control, "id_subcategory");
    assert_eq!(settings.sentinel_label, "---------");
    assert_eq!(settings.bind_retry_interval, Duration::from_millis(100));
    assert_eq!(settings.bind_timeout, None);
    assert_eq!(settings.failure_policy, FailurePolicy::KeepPrevious);
}

#[test]
fn file_values_are_applied_and_env_wins() {
    let path = temp_settings_file(
        r#"
base_url = "http://admin.internal:9000"
domain = "ledger"
bind_retry_ms = 25
bind_timeout_ms = 3000
failure_policy = "reset_to_sentinel"
"#,
    );

    let settings = load_settings_from(&path, env_from(&[("APP__DOMAIN", "finance")]));
    fs::remove_file(&path).expect("cleanup");

    assert_eq!(settings.base_url, "http://admin.internal:9000");
    assert_eq!(settings.domain, "finance");
    assert_eq!(settings.bind_retry_interval, Duration::from_millis(25));
    assert_eq!(settings.bind_timeout, Some(Duration::from_secs(3)));
    assert_eq!(settings.failure_policy, FailurePolicy::ResetToSentinel);
}

#[test]
fn zero_bind_timeout_means_wait_forever() {
    let settings = load_settings_from(
        Path::new("/nonexistent/field_sync.toml"),
        env_from(&[("APP__BIND_TIMEOUT_MS", "0")]),
    );
    assert_eq!(settings.bind_timeout, None);
}

#[test]
fn unparsable_env_overrides_are_ignored() {
    let settings = load_settings_from(
        Path::new("/nonexistent/field_sync.toml"),
        env_from(&[
            ("APP__BIND_RETRY_MS", "soon"),
            ("APP__FAILURE_POLICY", "explode"),
        ]),
    );
    assert_eq!(settings.bind_retry_interval, Duration::from_millis(100));
    assert_eq!(settings.failure_policy, FailurePolicy::KeepPrevious);
}

#[test]
fn failure_policy_accepts_kebab_case() {
    assert_eq!(
        "Reset-To-Sentinel".parse::<FailurePolicy>(),
        Ok(FailurePolicy::ResetToSentinel)
    );
}

#[test]
fn malformed_settings_file_falls_back_to_defaults() {
    let path = temp_settings_file("bind_retry_ms = \"fast\"");
    let settings = load_settings_from(&path, |_| None);
    fs::remove_file(&path).expect("cleanup");
    assert_eq!(settings.bind_retry_interval, Duration::from_millis(100));
}
