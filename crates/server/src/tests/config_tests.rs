use super::{
    apply_env, apply_file_settings, normalize_database_url, parse_file_settings,
    prepare_database_url, Settings,
};

use std::{collections::HashMap, path::PathBuf};

use exporter::ExportFormat;
use server_api::NoticeLocale;
use shared::domain::GridInputType;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn empty_database_url_falls_back_to_default() {
    assert_eq!(
        normalize_database_url("   "),
        Settings::default().database_url
    );
}

#[test]
fn creates_parent_dir_for_relative_sqlite_url() {
    let temp_root = tempfile::tempdir().expect("temp dir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("temp dir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}

#[test]
fn file_settings_override_defaults() {
    let raw = r#"
        bind_addr = "0.0.0.0:9000"
        managed_locales = ["fr", "en", "fr", " "]
        grid_input_type = "textarea"
        grid_toggle_similar = true
        export_format = "toml"
        notice_locale = "fr"
        notify_on_domain_waiting = false
        compiled_code_cache_dir = "/tmp/opcache"
    "#;
    let mut settings = Settings::default();
    apply_file_settings(&mut settings, parse_file_settings(raw).expect("parse"));

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.managed_locales, vec!["fr", "en"]);
    assert_eq!(settings.grid_input_type, GridInputType::Textarea);
    assert!(settings.grid_toggle_similar);
    assert_eq!(settings.export_format, ExportFormat::Toml);
    assert_eq!(settings.notice_locale, NoticeLocale::Fr);
    assert!(!settings.notify_on_domain_waiting);
    assert_eq!(
        settings.compiled_code_cache_dir,
        Some(PathBuf::from("/tmp/opcache"))
    );
    assert_eq!(settings.base_layout, Settings::default().base_layout);
}

#[test]
fn unknown_file_keys_are_rejected() {
    assert!(parse_file_settings("theme = \"dark\"").is_err());
}

#[test]
fn app_env_vars_win_over_legacy_names() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("SERVER_BIND", "127.0.0.1:1"),
            ("APP__BIND_ADDR", "127.0.0.1:2"),
            ("APP__MANAGED_LOCALES", "en, fr ,de"),
            ("APP__GRID_TOGGLE_SIMILAR", "true"),
            ("APP__EXPORT_DIR", "/srv/translations"),
        ]),
    );
    assert_eq!(settings.server_bind, "127.0.0.1:2");
    assert_eq!(settings.managed_locales, vec!["en", "fr", "de"]);
    assert!(settings.grid_toggle_similar);
    assert_eq!(settings.export_dir, PathBuf::from("/srv/translations"));
}

#[test]
fn unparsable_env_values_keep_previous_setting() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("APP__GRID_INPUT_TYPE", "wysiwyg"),
            ("APP__NOTIFY_ON_DOMAIN_WAITING", "maybe"),
        ]),
    );
    assert_eq!(settings.grid_input_type, GridInputType::Text);
    assert!(settings.notify_on_domain_waiting);
}
