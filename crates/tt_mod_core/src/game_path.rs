//! Troubleshooter install detection and validation utilities.

use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

/// Steam app id of Troubleshooter: Abandoned Children.
pub const STEAM_APP_ID: u32 = 470310;
const INSTALL_DIR: &str = "Troubleshooter";

static LIBRARY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""path"\s+"(.+?)""#).expect("library path pattern"));

/// A game root is a directory holding the `Package` directory.
pub fn is_valid_game_path(path: &Utf8Path) -> bool {
    path.is_dir() && path.join("Package").is_dir()
}

/// Library roots listed in a `libraryfolders.vdf` document.
pub fn parse_library_folders(vdf: &str) -> Vec<Utf8PathBuf> {
    LIBRARY_PATH
        .captures_iter(vdf)
        .map(|caps| Utf8PathBuf::from(caps[1].replace("\\\\", "\\")))
        .collect()
}

/// Steam install roots that may exist on this machine.
fn steam_roots() -> Vec<Utf8PathBuf> {
    let mut roots = Vec::new();

    if cfg!(target_os = "windows") {
        if let Some(path) = detect_steam_from_registry() {
            roots.push(path);
        }
        roots.push(Utf8PathBuf::from("C:\\Program Files (x86)\\Steam"));
        roots.push(Utf8PathBuf::from("C:\\Program Files\\Steam"));
    } else if let Ok(home) = std::env::var("HOME") {
        let home = Utf8PathBuf::from(home);
        if cfg!(target_os = "macos") {
            roots.push(home.join("Library/Application Support/Steam"));
        } else {
            roots.push(home.join(".steam/steam"));
            roots.push(home.join(".local/share/Steam"));
            roots.push(home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"));
        }
    }

    roots
}

/// Read the Steam install location from the Windows registry.
fn detect_steam_from_registry() -> Option<Utf8PathBuf> {
    if cfg!(not(target_os = "windows")) {
        return None;
    }

    let output = std::process::Command::new("reg")
        .args(["query", "HKCU\\Software\\Valve\\Steam", "/v", "SteamPath"])
        .output()
        .ok()?;

    let stdout = String::from_utf8(output.stdout).ok()?;
    stdout
        .lines()
        .filter(|line| line.contains("SteamPath") && line.contains("REG_SZ"))
        .find_map(|line| line.split("REG_SZ").nth(1))
        .map(|path| Utf8PathBuf::from(path.trim()))
}

/// Every `steamapps` directory reachable from the known Steam roots.
fn steamapps_dirs() -> Vec<Utf8PathBuf> {
    let mut dirs: Vec<Utf8PathBuf> = Vec::new();

    for root in steam_roots() {
        let steamapps = root.join("steamapps");
        if !steamapps.is_dir() {
            continue;
        }
        if let Ok(vdf) = fs::read_to_string(steamapps.join("libraryfolders.vdf")) {
            for library in parse_library_folders(&vdf) {
                let dir = library.join("steamapps");
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        if !dirs.contains(&steamapps) {
            dirs.push(steamapps);
        }
    }

    dirs
}

/// Locate the game inside a single `steamapps` directory.
pub fn find_in_steamapps(steamapps: &Utf8Path) -> Option<Utf8PathBuf> {
    let manifest = steamapps.join(format!("appmanifest_{}.acf", STEAM_APP_ID));
    if !manifest.is_file() {
        return None;
    }
    let root = steamapps.join("common").join(INSTALL_DIR);
    is_valid_game_path(&root).then_some(root)
}

/// Auto-detect a Troubleshooter installation through the Steam libraries.
pub fn auto_detect_game_path() -> Option<Utf8PathBuf> {
    let found = steamapps_dirs().iter().find_map(|dir| find_in_steamapps(dir));
    match &found {
        Some(path) => tracing::info!("Detected game installation at {}", path),
        None => tracing::debug!("No Steam library contains app {}", STEAM_APP_ID),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_library_folders() {
        let vdf = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
	}
	"1"
	{
		"path"		"/mnt/games/SteamLibrary"
	}
}
"#;
        assert_eq!(
            parse_library_folders(vdf),
            vec![
                Utf8PathBuf::from("C:\\Program Files (x86)\\Steam"),
                Utf8PathBuf::from("/mnt/games/SteamLibrary"),
            ]
        );
    }

    #[test]
    fn test_find_in_steamapps() {
        let dir = tempdir().unwrap();
        let steamapps = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let root = steamapps.join("common").join(INSTALL_DIR);
        fs::create_dir_all(root.join("Package")).unwrap();

        assert_eq!(find_in_steamapps(&steamapps), None);

        fs::write(steamapps.join("appmanifest_470310.acf"), "").unwrap();
        assert_eq!(find_in_steamapps(&steamapps), Some(root.clone()));
        assert!(is_valid_game_path(&root));
        assert!(!is_valid_game_path(&steamapps));
    }
}
