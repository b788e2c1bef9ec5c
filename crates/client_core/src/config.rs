use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_SETTINGS_FILE: &str = "events.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_url: String,
    pub cache_ttl_ms: u64,
    pub prefetch_comments: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            cache_ttl_ms: 3000,
            prefetch_comments: true,
        }
    }
}

impl ClientSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    cache_ttl_ms: Option<u64>,
    prefetch_comments: Option<bool>,
}

/// Defaults, then `events.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if path.exists() {
        match read_settings_file(path) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), "ignoring settings file: {err:#}"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn read_settings_file(path: &Path) -> anyhow::Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.cache_ttl_ms {
        settings.cache_ttl_ms = v;
    }
    if let Some(v) = file_cfg.prefetch_comments {
        settings.prefetch_comments = v;
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    // Later names win.
    for key in ["NEXT_PUBLIC_API_URL", "EVENTS_API_URL", "APP__API_URL"] {
        if let Some(v) = var(key).filter(|v| !v.trim().is_empty()) {
            settings.api_url = v;
        }
    }

    if let Some(v) = var("APP__CACHE_TTL_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.cache_ttl_ms = parsed,
            Err(_) => warn!(value = %v, "APP__CACHE_TTL_MS is not a number; keeping default"),
        }
    }

    if let Some(v) = var("APP__PREFETCH_COMMENTS") {
        settings.prefetch_comments = !matches!(v.as_str(), "0" | "false" | "no");
    }
}

/// Ensures the base url ends in `/` so routes join beneath it rather than
/// replacing its last path segment.
pub fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_API_URL.to_string();
    }
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
