//! Application configuration stored in config.toml next to the executable.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Game root, the folder holding `Package/`, `Data/` and `Mods/`.
    pub game_path: Option<Utf8PathBuf>,
    /// Prefixes extracted before installing mods that ship patch scripts.
    pub auto_extract: Vec<String>,
    /// Last comma separated manual extraction request.
    pub manual_extract: Option<String>,
    /// Extraction worker count. One per core when unset.
    pub workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_path: None,
            auto_extract: default_auto_extract(),
            manual_extract: None,
            workers: None,
        }
    }
}

pub fn default_auto_extract() -> Vec<String> {
    ["CEGUI/datafiles/lua_scripts", "script", "stage", "xml"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the application configuration from config.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    default_config_path()
        .map(|path| load_config_from(&path))
        .unwrap_or_default()
}

pub fn load_config_from(path: &Utf8Path) -> AppConfig {
    let Ok(content) = fs::read_to_string(path) else {
        return AppConfig::default();
    };
    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path, e);
            AppConfig::default()
        }
    }
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    match default_config_path() {
        Some(path) => save_config_to(cfg, &path),
        None => Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Could not determine config path",
        )),
    }
}

pub fn save_config_to(cfg: &AppConfig, path: &Utf8Path) -> io::Result<()> {
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path, content)
}
