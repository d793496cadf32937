use std::{collections::HashMap, fs, path::PathBuf};

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub domain: String,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            domain: "dds".into(),
            catalog_path: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string("listing_server.toml")
        .ok()
        .and_then(|raw| toml::from_str::<HashMap<String, String>>(&raw).ok())
        .unwrap_or_default();
    let env_cfg: HashMap<String, String> = std::env::vars().collect();
    settings_from(&file_cfg, &env_cfg)
}

pub(crate) fn settings_from(
    file_cfg: &HashMap<String, String>,
    env_cfg: &HashMap<String, String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("domain") {
        settings.domain = v.clone();
    }
    if let Some(v) = file_cfg.get("catalog_path") {
        settings.catalog_path = Some(PathBuf::from(v));
    }

    if let Some(v) = env_cfg.get("SERVER_BIND") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = env_cfg.get("APP__BIND_ADDR") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = env_cfg.get("APP__DOMAIN") {
        settings.domain = v.clone();
    }
    if let Some(v) = env_cfg.get("APP__CATALOG_PATH") {
        settings.catalog_path = Some(PathBuf::from(v));
    }

    settings.domain = settings.domain.trim_matches('/').to_string();
    if settings.domain.is_empty() {
        settings.domain = Settings::default().domain;
    }
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
