//! The capability interface patch programs run against.
//!
//! Patch programs never touch the filesystem directly. They ask a
//! [`GameFiles`] implementation for a handle by logical path and edit the
//! handle in memory; the owner of the handles decides when to write.

use camino::{Utf8Path, Utf8PathBuf};
use tt_assets::utils::normalize_logical_path;
use tt_assets::GameLayout;
use tt_markup::MarkupFile;
use tt_script::ScriptFile;

use crate::dictionary::DictionaryFile;
use crate::error::Result;

/// Handles to game files, addressed by logical path.
pub trait GameFiles {
    /// A Lua script. Paths without an extension get `.lua`.
    fn script(&mut self, path: &str) -> Result<&mut ScriptFile>;

    /// A markup file. Paths without an extension get one from their first
    /// directory (`xml` → `.xml`, `stage` → `.stage`, `Dictionary` → `.dkm`).
    fn markup(&mut self, path: &str) -> Result<&mut MarkupFile>;

    /// A line-keyed dictionary. Paths without an extension get `.dic`.
    fn dictionary(&mut self, path: &str) -> Result<&mut DictionaryFile>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    Markup,
    Dictionary,
}

/// A logical path resolved against a game layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized logical path with its extension, used as the cache key.
    pub key: String,
    pub file: Utf8PathBuf,
}

/// Resolve `logical` to a cache key and a file under the game root.
///
/// `Dictionary/...` markup and every dictionary resolve under the game root;
/// everything else resolves under `Data/`.
pub fn resolve(layout: &GameLayout, kind: FileKind, logical: &str) -> ResolvedPath {
    let mut key = normalize_logical_path(logical);
    let first_dir = key.split('/').next().unwrap_or_default().to_string();
    let has_extension = Utf8Path::new(&key).extension().is_some();

    if !has_extension {
        let extension = match kind {
            FileKind::Script => Some(".lua"),
            FileKind::Dictionary => Some(".dic"),
            FileKind::Markup => match first_dir.as_str() {
                "xml" => Some(".xml"),
                "stage" => Some(".stage"),
                "Dictionary" => Some(".dkm"),
                _ => None,
            },
        };
        if let Some(extension) = extension {
            key.push_str(extension);
        }
    }

    let under_root = match kind {
        FileKind::Dictionary => true,
        FileKind::Markup => first_dir == "Dictionary",
        FileKind::Script => false,
    };
    let file = if under_root {
        layout.root().join(&key)
    } else {
        layout.data_dir().join(&key)
    };

    ResolvedPath { key, file }
}
