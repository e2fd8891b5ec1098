use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Serialize;

pub const DEFAULT_CONFIG_PATH: &str = "shell.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub views_root: PathBuf,
    /// When set, views are fetched over HTTP instead of from `views_root`.
    pub views_base_url: Option<String>,
    pub preferences_path: PathBuf,
    pub storage_root: PathBuf,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            views_root: "./public".into(),
            views_base_url: None,
            preferences_path: "./data/preferences.json".into(),
            storage_root: "./data/opfs".into(),
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

/// Defaults, then the optional TOML file, then `SHELL_*` and `APP__*`
/// variables, the latter winning.
pub fn load_settings_with(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("views_root") {
                settings.views_root = v.into();
            }
            if let Some(v) = file_cfg.get("views_base_url") {
                settings.views_base_url = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("preferences_path") {
                settings.preferences_path = v.into();
            }
            if let Some(v) = file_cfg.get("storage_root") {
                settings.storage_root = v.into();
            }
            if let Some(v) = file_cfg.get("log_filter") {
                settings.log_filter = v.clone();
            }
        }
    }

    let lookup = |plain: &str, prefixed: &str| env(prefixed).or_else(|| env(plain));

    if let Some(v) = lookup("SHELL_VIEWS_ROOT", "APP__VIEWS_ROOT") {
        settings.views_root = v.into();
    }
    if let Some(v) = lookup("SHELL_VIEWS_BASE_URL", "APP__VIEWS_BASE_URL") {
        settings.views_base_url = Some(v);
    }
    if let Some(v) = lookup("SHELL_PREFERENCES_PATH", "APP__PREFERENCES_PATH") {
        settings.preferences_path = v.into();
    }
    if let Some(v) = lookup("SHELL_STORAGE_ROOT", "APP__STORAGE_ROOT") {
        settings.storage_root = v.into();
    }
    if let Some(v) = lookup("SHELL_LOG", "APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings
}

/// Creates the parent directory of a file the shell will write.
pub fn ensure_parent_dir_exists(path: &Path) -> anyhow::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for '{}'",
            parent.display(),
            path.display()
        )
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
