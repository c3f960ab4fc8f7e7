//! The mod settings document (`Mods/ModSettings.xml`).
//!
//! ```xml
//! <mods>
//!     <mod name="BetterLoot" enabled="1"/>
//!     <mod name="Cosmetics" enabled="0"/>
//! </mods>
//! ```
//!
//! Document order is install priority: later mods win.

use camino::{Utf8Path, Utf8PathBuf};
use tt_markup::{Document, Element};

use crate::error::{Error, Result};

pub const SETTINGS_FILE: &str = "ModSettings.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ModSettings {
    path: Utf8PathBuf,
    pub mods: Vec<ModEntry>,
}

impl ModSettings {
    /// Load the settings document, creating an empty one when it is missing
    /// or unreadable.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::warn!("{} not found, creating...", SETTINGS_FILE);
            return Self::create(path);
        }

        match Document::open(&path) {
            Ok(document) => Ok(Self {
                mods: parse_entries(&document.root),
                path,
            }),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}. Recreating it", path, e);
                Self::create(path)
            }
        }
    }

    fn create(path: Utf8PathBuf) -> Result<Self> {
        let settings = Self { path, mods: Vec::new() };
        settings
            .save()
            .map_err(|e| Error::Settings(format!("failed to create {}: {}", settings.path, e)))?;
        tracing::info!("{} created at {}", SETTINGS_FILE, settings.path);
        Ok(settings)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let mut root = Element::new("mods");
        for entry in &self.mods {
            root.push(
                Element::new("mod")
                    .with_attribute("name", entry.name.as_str())
                    .with_attribute("enabled", if entry.enabled { "1" } else { "0" }),
            );
        }
        Document::new(root).save(&self.path)?;
        tracing::info!("Mod settings saved at {}", self.path);
        Ok(())
    }

    /// Names of enabled mods, in priority order.
    pub fn enabled(&self) -> Vec<String> {
        self.mods
            .iter()
            .filter(|m| m.enabled)
            .map(|m| m.name.clone())
            .collect()
    }

    /// Returns false when no mod has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.mods.iter_mut().find(|m| m.name == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Reconcile with the mod directories on disk.
    ///
    /// Listed mods whose directory is missing or empty are dropped. Non-empty
    /// directories not listed yet are appended disabled, sorted by name.
    /// Returns the names that were added.
    pub fn discover(&mut self, mods_dir: &Utf8Path) -> Result<Vec<String>> {
        let mut on_disk = Vec::new();
        if mods_dir.exists() {
            for entry in mods_dir.read_dir_utf8().map_err(|e| Error::io(mods_dir, e))? {
                let entry = entry.map_err(|e| Error::io(mods_dir, e))?;
                if entry.path().is_dir() && !is_empty_dir(entry.path()) {
                    on_disk.push(entry.file_name().to_string());
                }
            }
        }
        on_disk.sort();

        self.mods.retain(|m| on_disk.contains(&m.name));
        let added: Vec<String> = on_disk
            .into_iter()
            .filter(|name| !self.mods.iter().any(|m| &m.name == name))
            .collect();
        self.mods.extend(added.iter().map(|name| ModEntry {
            name: name.clone(),
            enabled: false,
        }));
        Ok(added)
    }
}

fn parse_entries(root: &Element) -> Vec<ModEntry> {
    root.elements()
        .filter_map(|element| {
            let name = element.attribute("name")?;
            Some(ModEntry {
                name: name.to_string(),
                enabled: element.attribute("enabled") == Some("1"),
            })
        })
        .collect()
}

fn is_empty_dir(path: &Utf8Path) -> bool {
    path.read_dir_utf8()
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = utf8(dir.path()).join("Mods").join(SETTINGS_FILE);

        let settings = ModSettings::load(&path).unwrap();
        assert!(settings.mods.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_load_recreates_unparsable_file() {
        let dir = tempdir().unwrap();
        let path = utf8(dir.path()).join(SETTINGS_FILE);
        std::fs::write(&path, "<mods><mod").unwrap();

        let settings = ModSettings::load(&path).unwrap();
        assert!(settings.mods.is_empty());
        assert!(Document::open(&path).is_ok());
    }

    #[test]
    fn test_round_trip_and_enabled_order() {
        let dir = tempdir().unwrap();
        let path = utf8(dir.path()).join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"<mods><mod name="b" enabled="1"/><mod name="a" enabled="0"/><mod name="c" enabled="1"/></mods>"#,
        )
        .unwrap();

        let mut settings = ModSettings::load(&path).unwrap();
        assert_eq!(settings.enabled(), vec!["b".to_string(), "c".to_string()]);

        assert!(settings.set_enabled("a", true));
        assert!(!settings.set_enabled("zzz", true));
        settings.save().unwrap();

        let reloaded = ModSettings::load(&path).unwrap();
        assert_eq!(reloaded.enabled(), vec!["b".to_string(), "a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_discover() {
        let dir = tempdir().unwrap();
        let mods = utf8(dir.path()).join("Mods");
        for name in ["zeta", "alpha", "listed", "empty"] {
            std::fs::create_dir_all(mods.join(name)).unwrap();
        }
        for name in ["zeta", "alpha", "listed"] {
            std::fs::write(mods.join(name).join("a.xml"), "<a/>").unwrap();
        }

        let mut settings = ModSettings {
            path: mods.join(SETTINGS_FILE),
            mods: vec![
                ModEntry { name: "listed".into(), enabled: true },
                ModEntry { name: "gone".into(), enabled: true },
            ],
        };
        let added = settings.discover(&mods).unwrap();

        assert_eq!(added, vec!["alpha".to_string(), "zeta".to_string()]);
        let names: Vec<&str> = settings.mods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["listed", "alpha", "zeta"]);
        assert_eq!(settings.enabled(), vec!["listed".to_string()]);
    }
}
