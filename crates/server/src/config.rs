use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    Sqlite,
    Memory,
}

impl FromStr for HistoryBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown history backend '{other}', expected 'sqlite' or 'memory'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub history_backend: HistoryBackend,
    pub cors_allow_origin: String,
    pub metrics_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:8089".into(),
            database_url: "sqlite://./data/history.db".into(),
            history_backend: HistoryBackend::Sqlite,
            cors_allow_origin: "*".into(),
            metrics_prefix: "calculator".into(),
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let file = fs::read_to_string("server.toml").ok();
    settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment variables. The
/// `APP__*` spelling wins over the short one.
pub(crate) fn settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    let mut backend: Option<String> = None;

    if let Some(raw) = file {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)
            .context("server.toml must be a flat table of string values")?;
        if let Some(v) = file_cfg.get("bind_addr") {
            settings.server_bind = v.clone();
        }
        if let Some(v) = file_cfg.get("database_url") {
            settings.database_url = v.clone();
        }
        if let Some(v) = file_cfg.get("history_backend") {
            backend = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("cors_allow_origin") {
            settings.cors_allow_origin = v.clone();
        }
        if let Some(v) = file_cfg.get("metrics_prefix") {
            settings.metrics_prefix = v.clone();
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__HISTORY_BACKEND") {
        backend = Some(v);
    }
    if let Some(v) = env("APP__CORS_ALLOW_ORIGIN") {
        settings.cors_allow_origin = v;
    }
    if let Some(v) = env("APP__METRICS_PREFIX") {
        settings.metrics_prefix = v;
    }

    if let Some(raw) = backend {
        settings.history_backend = raw.parse()?;
    }

    Ok(settings)
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
