use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_and_env_yield_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_with(&dir.path().join("shell.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shell.toml");
    fs::write(
        &path,
        "views_root = \"/srv/app\"\nviews_base_url = \"https://panda.example/\"\nlog_filter = \"debug\"\n",
    )
    .expect("write config");

    let settings = load_settings_with(&path, env_from(&[]));

    assert_eq!(settings.views_root, PathBuf::from("/srv/app"));
    assert_eq!(
        settings.views_base_url.as_deref(),
        Some("https://panda.example/")
    );
    assert_eq!(settings.log_filter, "debug");
    assert_eq!(settings.storage_root, Settings::default().storage_root);
}

#[test]
fn env_overrides_file_and_prefixed_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shell.toml");
    fs::write(&path, "storage_root = \"/from/file\"\n").expect("write config");

    let settings = load_settings_with(
        &path,
        env_from(&[
            ("SHELL_STORAGE_ROOT", "/from/plain"),
            ("APP__STORAGE_ROOT", "/from/prefixed"),
            ("SHELL_PREFERENCES_PATH", "/prefs.json"),
        ]),
    );

    assert_eq!(settings.storage_root, PathBuf::from("/from/prefixed"));
    assert_eq!(settings.preferences_path, PathBuf::from("/prefs.json"));
}

#[test]
fn malformed_file_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shell.toml");
    fs::write(&path, "views_root = [1, 2").expect("write config");

    assert_eq!(load_settings_with(&path, env_from(&[])), Settings::default());
}

#[test]
fn creates_parent_dir_for_nested_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("data").join("prefs").join("preferences.json");

    ensure_parent_dir_exists(&file).expect("prepare");
    assert!(dir.path().join("data").join("prefs").is_dir());

    ensure_parent_dir_exists(Path::new("preferences.json")).expect("bare file name");
}
