use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use exporter::ExportFormat;
use serde::Deserialize;
use server_api::NoticeLocale;
use shared::domain::GridInputType;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub managed_locales: Vec<String>,
    pub base_layout: String,
    pub grid_input_type: GridInputType,
    pub grid_toggle_similar: bool,
    pub cache_dir: PathBuf,
    pub compiled_code_cache_dir: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub export_format: ExportFormat,
    pub notice_locale: NoticeLocale,
    pub notify_on_domain_waiting: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/translations.db".into(),
            managed_locales: vec!["en".into()],
            base_layout: "translations/layout.html".into(),
            grid_input_type: GridInputType::Text,
            grid_toggle_similar: false,
            cache_dir: PathBuf::from("./data/cache/translations"),
            compiled_code_cache_dir: None,
            export_dir: PathBuf::from("./data/translations"),
            export_format: ExportFormat::Json,
            notice_locale: NoticeLocale::En,
            notify_on_domain_waiting: true,
        }
    }
}

/// Keys accepted in `server.toml`; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    managed_locales: Option<Vec<String>>,
    base_layout: Option<String>,
    grid_input_type: Option<GridInputType>,
    grid_toggle_similar: Option<bool>,
    cache_dir: Option<PathBuf>,
    compiled_code_cache_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    export_format: Option<ExportFormat>,
    notice_locale: Option<NoticeLocale>,
    notify_on_domain_waiting: Option<bool>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        match parse_file_settings(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(error) => {
                let error = format!("{error:#}");
                warn!(%error, "ignoring invalid server.toml");
            }
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    toml::from_str::<FileSettings>(raw).context("failed to parse server.toml")
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.managed_locales {
        settings.managed_locales = normalize_locales(v);
    }
    if let Some(v) = file_cfg.base_layout {
        settings.base_layout = v;
    }
    if let Some(v) = file_cfg.grid_input_type {
        settings.grid_input_type = v;
    }
    if let Some(v) = file_cfg.grid_toggle_similar {
        settings.grid_toggle_similar = v;
    }
    if let Some(v) = file_cfg.cache_dir {
        settings.cache_dir = v;
    }
    if let Some(v) = file_cfg.compiled_code_cache_dir {
        settings.compiled_code_cache_dir = Some(v);
    }
    if let Some(v) = file_cfg.export_dir {
        settings.export_dir = v;
    }
    if let Some(v) = file_cfg.export_format {
        settings.export_format = v;
    }
    if let Some(v) = file_cfg.notice_locale {
        settings.notice_locale = v;
    }
    if let Some(v) = file_cfg.notify_on_domain_waiting {
        settings.notify_on_domain_waiting = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("APP__MANAGED_LOCALES") {
        settings.managed_locales =
            normalize_locales(v.split(',').map(str::to_string).collect());
    }
    if let Some(v) = var("APP__BASE_LAYOUT") {
        settings.base_layout = v;
    }
    parse_env(&var, "APP__GRID_INPUT_TYPE", &mut settings.grid_input_type);
    parse_env(&var, "APP__GRID_TOGGLE_SIMILAR", &mut settings.grid_toggle_similar);

    if let Some(v) = var("APP__CACHE_DIR") {
        settings.cache_dir = PathBuf::from(v);
    }
    if let Some(v) = var("APP__COMPILED_CODE_CACHE_DIR") {
        settings.compiled_code_cache_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
    }
    if let Some(v) = var("APP__EXPORT_DIR") {
        settings.export_dir = PathBuf::from(v);
    }
    parse_env(&var, "APP__EXPORT_FORMAT", &mut settings.export_format);
    parse_env(&var, "APP__NOTICE_LOCALE", &mut settings.notice_locale);
    parse_env(
        &var,
        "APP__NOTIFY_ON_DOMAIN_WAITING",
        &mut settings.notify_on_domain_waiting,
    );
}

fn parse_env<T>(var: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(error) => warn!(%name, %raw, %error, "ignoring unparsable setting"),
    }
}

fn normalize_locales(raw: Vec<String>) -> Vec<String> {
    let mut locales: Vec<String> = Vec::with_capacity(raw.len());
    for locale in raw {
        let locale = locale.trim();
        if !locale.is_empty() && !locales.iter().any(|l| l == locale) {
            locales.push(locale.to_string());
        }
    }
    locales
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
