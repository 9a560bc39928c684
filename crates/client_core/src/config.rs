use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;

pub const SETTINGS_FILE: &str = "converter.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub service_base_url: String,
    /// Unset means a single untimed attempt per request.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_base_url: "http://127.0.0.1:5000".into(),
            request_timeout_secs: None,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

pub fn load_settings() -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();
    apply_settings_file(&mut settings, Path::new(SETTINGS_FILE))?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.service_base_url = normalize_base_url(&settings.service_base_url);
    Ok(settings)
}

fn apply_settings_file(settings: &mut ClientSettings, path: &Path) -> anyhow::Result<()> {
    let Ok(raw) = fs::read_to_string(path) else {
        return Ok(());
    };
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;

    if let Some(v) = file_cfg.get("service_base_url").and_then(toml::Value::as_str) {
        settings.service_base_url = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(toml::Value::as_integer)
    {
        settings.request_timeout_secs = u64::try_from(v).ok();
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("CONVERTER_API_URL") {
        settings.service_base_url = v;
    }
    if let Some(v) = var("APP__SERVICE_BASE_URL") {
        settings.service_base_url = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
