//! A script file held as a definition map.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::order::resolve_order;
use crate::parse::{parse_definitions, Definitions};

/// How a merge treats incoming definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Overwrite the base map, tagging each block as new or updated.
    Apply,
    /// Leave the base map untouched and record the changes.
    Record,
}

/// Whether a recorded definition was absent from the base or differs from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Update,
}

/// One recorded definition change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionChange {
    pub kind: ChangeKind,
    pub key: String,
    pub code: String,
}

/// Where [`ScriptFile::insert_code`] puts new code relative to the marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

/// A Lua file parsed into top-level definitions.
///
/// All editing happens on the in-memory map; nothing touches disk until
/// [`write_to`](Self::write_to).
#[derive(Debug, Clone)]
pub struct ScriptFile {
    path: PathBuf,
    source: String,
    definitions: Definitions,
    original: Definitions,
    changes: Vec<DefinitionChange>,
}

impl ScriptFile {
    /// Read and parse a script from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = read_source(path)?;
        Ok(Self::from_source(path, source))
    }

    /// Parse a script from text already in memory.
    pub fn from_source(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        let source = normalize_newlines(source.into());
        let definitions = parse_definitions(&source);

        Self {
            path: path.into(),
            source,
            original: definitions.clone(),
            definitions,
            changes: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.definitions.get(key).map(String::as_str)
    }

    /// Whether the map differs from what was parsed at load time.
    pub fn is_modified(&self) -> bool {
        self.definitions != self.original
    }

    /// Changes recorded by the last [`MergeMode::Record`] merge.
    pub fn changes(&self) -> &[DefinitionChange] {
        &self.changes
    }

    /// Drain the recorded changes.
    pub fn take_changes(&mut self) -> Vec<DefinitionChange> {
        std::mem::take(&mut self.changes)
    }

    /// Merge another script file into this one.
    pub fn merge_with(&mut self, path: impl AsRef<Path>, mode: MergeMode) -> Result<()> {
        let source = read_source(path.as_ref())?;
        self.merge_source(&source, mode);
        Ok(())
    }

    /// Merge script text into this file.
    ///
    /// Text identical to the base source is a no-op. New definitions are
    /// listed before updated ones, each group in incoming order.
    pub fn merge_source(&mut self, source: &str, mode: MergeMode) {
        self.changes.clear();

        let source = normalize_newlines(source.to_string());
        if source == self.source {
            return;
        }

        let incoming = parse_definitions(&source);
        let (new, updated): (Vec<_>, Vec<_>) = incoming
            .into_iter()
            .filter_map(|(key, code)| match self.definitions.get(&key) {
                None => Some(DefinitionChange {
                    kind: ChangeKind::New,
                    key,
                    code,
                }),
                Some(existing) if *existing != code => Some(DefinitionChange {
                    kind: ChangeKind::Update,
                    key,
                    code,
                }),
                Some(_) => None,
            })
            .partition(|change| change.kind == ChangeKind::New);

        self.changes = new.into_iter().chain(updated).collect();

        match mode {
            MergeMode::Record => {
                tracing::debug!("{}: recorded {} change(s)", self.path.display(), self.changes.len());
            }
            MergeMode::Apply => {
                for change in &self.changes {
                    let tag = match change.kind {
                        ChangeKind::New => "-- NEW",
                        ChangeKind::Update => "-- UPDATE",
                    };
                    self.definitions
                        .insert(change.key.clone(), format!("{}\n{}", tag, change.code));
                }
            }
        }
    }

    /// Add a definition, overwriting (with a warning) any existing one.
    pub fn add_definition(&mut self, key: &str, code: &str) {
        if self.definitions.get(key).is_some_and(|c| !c.is_empty()) {
            tracing::warn!("Definition '{}' already exists, overwriting", key);
        }
        self.definitions.insert(key.to_string(), code.to_string());
    }

    /// Replace a definition, adding it (with a warning) if it is missing.
    pub fn replace_definition(&mut self, key: &str, code: &str) {
        if !self.definitions.get(key).is_some_and(|c| !c.is_empty()) {
            tracing::warn!("Definition '{}' not found, adding it", key);
        }
        self.definitions.insert(key.to_string(), code.to_string());
    }

    /// Replace literal text inside one definition.
    ///
    /// `count = None` replaces every occurrence.
    pub fn replace_code(&mut self, key: &str, old: &str, new: &str, count: Option<usize>) -> Result<()> {
        let block = self.existing_block(key)?;
        if !block.contains(old) {
            return Err(Error::LiteralNotFound {
                definition: key.to_string(),
                literal: old.to_string(),
            });
        }

        let replaced = match count {
            Some(n) => block.replacen(old, new, n),
            None => block.replace(old, new),
        };
        self.definitions.insert(key.to_string(), replaced);
        Ok(())
    }

    /// Insert code on its own line before or after every line containing
    /// `marker`, up to `count` times.
    pub fn insert_code(
        &mut self,
        key: &str,
        marker: &str,
        code: &str,
        position: InsertPosition,
        count: Option<usize>,
    ) -> Result<()> {
        if count == Some(0) {
            return Ok(());
        }
        if marker.is_empty() {
            return Err(Error::EmptyMarker);
        }

        let block = self.existing_block(key)?;
        let mut out = String::with_capacity(block.len() + code.len());
        let mut copied = 0;
        let mut search_from = 0;
        let mut inserted = 0;

        while let Some(found) = block.get(search_from..).and_then(|rest| rest.find(marker)) {
            let at = search_from + found;
            let line_start = block[..at].rfind('\n').map_or(0, |nl| nl + 1);
            let line_end = block[at + marker.len()..]
                .find('\n')
                .map_or(block.len(), |nl| at + marker.len() + nl);

            match position {
                InsertPosition::Before => {
                    out.push_str(&block[copied..line_start]);
                    out.push_str(code);
                    out.push('\n');
                    copied = line_start;
                }
                InsertPosition::After => {
                    out.push_str(&block[copied..line_end]);
                    out.push('\n');
                    out.push_str(code);
                    copied = line_end;
                }
            }

            inserted += 1;
            if count.is_some_and(|n| inserted >= n) {
                break;
            }
            search_from = line_end + 1;
        }

        if inserted == 0 {
            return Err(Error::MarkerNotFound {
                definition: key.to_string(),
                marker: marker.to_string(),
            });
        }

        out.push_str(&block[copied..]);
        self.definitions.insert(key.to_string(), out);
        Ok(())
    }

    /// Serialize the definitions in dependency order.
    pub fn render(&self) -> Result<String> {
        let order = resolve_order(&self.definitions)?;
        let mut content = order
            .iter()
            .filter_map(|key| self.definitions.get(*key))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        content.push('\n');
        Ok(content)
    }

    /// Write the file if anything changed since it was loaded.
    ///
    /// Returns `false` without touching disk when the map is unchanged.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<bool> {
        if self.definitions.is_empty() || !self.is_modified() {
            return Ok(false);
        }

        let path = path.as_ref();
        let content = self.render()?;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))?;
        tracing::info!("Wrote {}", path.display());
        Ok(true)
    }

    fn existing_block(&self, key: &str) -> Result<&str> {
        self.definitions
            .get(key)
            .filter(|c| !c.is_empty())
            .map(String::as_str)
            .ok_or_else(|| Error::DefinitionNotFound(key.to_string()))
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn normalize_newlines(source: String) -> String {
    if source.contains("\r\n") {
        source.replace("\r\n", "\n")
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_direct_merge_tags_and_orders() {
        let mut file = ScriptFile::from_source("base.lua", "x = 1\n");
        file.merge_source("x = 2\ny = x + 1\n", MergeMode::Apply);

        assert_eq!(file.get("x"), Some("-- UPDATE\nx = 2"));
        assert_eq!(file.get("y"), Some("-- NEW\ny = x + 1"));
        assert_eq!(file.render().unwrap(), "-- UPDATE\nx = 2\n-- NEW\ny = x + 1\n");
    }

    #[test]
    fn test_record_mode_leaves_base() {
        let mut file = ScriptFile::from_source("base.lua", "x = 1\n");
        file.merge_source("x = 2\ny = x + 1\n", MergeMode::Record);

        assert!(!file.is_modified());
        assert_eq!(
            file.changes(),
            &[
                DefinitionChange {
                    kind: ChangeKind::New,
                    key: "y".into(),
                    code: "y = x + 1".into(),
                },
                DefinitionChange {
                    kind: ChangeKind::Update,
                    key: "x".into(),
                    code: "x = 2".into(),
                },
            ]
        );
    }

    #[test]
    fn test_identical_source_is_noop() {
        let mut file = ScriptFile::from_source("base.lua", "x = 1\r\n");
        file.merge_source("x = 1\n", MergeMode::Apply);
        assert!(file.changes().is_empty());
        assert!(!file.is_modified());
    }

    #[test]
    fn test_unchanged_definitions_are_ignored() {
        let mut file = ScriptFile::from_source("base.lua", "x = 1\ny = 2\n");
        file.merge_source("y = 2\n", MergeMode::Record);
        assert!(file.changes().is_empty());
    }

    #[test]
    fn test_add_and_replace_definition() {
        let mut file = ScriptFile::from_source("base.lua", "x = 1\n");
        file.add_definition("x", "x = 5");
        file.replace_definition("z", "z = 3");
        assert_eq!(file.get("x"), Some("x = 5"));
        assert_eq!(file.get("z"), Some("z = 3"));
    }

    #[test]
    fn test_replace_code_with_count() {
        let mut file = ScriptFile::from_source("base.lua", "function f()\n  a()\n  a()\nend\n");
        file.replace_code("function f", "a()", "b()", Some(1)).unwrap();
        assert_eq!(file.get("function f"), Some("function f()\n  b()\n  a()\nend"));

        let err = file.replace_code("function f", "zzz", "b()", None).unwrap_err();
        assert!(matches!(err, Error::LiteralNotFound { .. }));

        let err = file.replace_code("function g", "a()", "b()", None).unwrap_err();
        assert!(matches!(err, Error::DefinitionNotFound(_)));
    }

    #[test]
    fn test_insert_code_after_every_marker() {
        let mut file = ScriptFile::from_source("base.lua", "function f()\n  step()\n  step()\nend\n");
        file.insert_code("function f", "step()", "  log()", InsertPosition::After, None)
            .unwrap();
        assert_eq!(
            file.get("function f"),
            Some("function f()\n  step()\n  log()\n  step()\n  log()\nend")
        );
    }

    #[test]
    fn test_insert_code_before_with_limit() {
        let mut file = ScriptFile::from_source("base.lua", "function f()\n  step()\n  step()\nend\n");
        file.insert_code("function f", "step()", "  log()", InsertPosition::Before, Some(1))
            .unwrap();
        assert_eq!(
            file.get("function f"),
            Some("function f()\n  log()\n  step()\n  step()\nend")
        );
    }

    #[test]
    fn test_insert_code_errors() {
        let mut file = ScriptFile::from_source("base.lua", "function f()\nend\n");
        let err = file
            .insert_code("function f", "missing", "x", InsertPosition::After, None)
            .unwrap_err();
        assert!(matches!(err, Error::MarkerNotFound { .. }));

        // zero count never looks at the definition
        file.insert_code("nope", "missing", "x", InsertPosition::After, Some(0))
            .unwrap();
    }

    #[test]
    fn test_write_only_when_modified() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.lua");
        let update = dir.path().join("update.lua");
        std::fs::write(&base, "x = 1\n").unwrap();
        std::fs::write(&update, "y = x + 1\n").unwrap();

        let mut file = ScriptFile::open(&base).unwrap();
        assert!(!file.write_to(&base).unwrap());

        file.merge_with(&update, MergeMode::Apply).unwrap();
        assert!(file.write_to(&base).unwrap());
        assert_eq!(std::fs::read_to_string(&base).unwrap(), "x = 1\n-- NEW\ny = x + 1\n");
    }

    #[test]
    fn test_cyclic_render_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.lua");

        let mut file = ScriptFile::from_source("base.lua", "c = 1\n");
        file.merge_source("local a = b\nlocal b = a\n", MergeMode::Apply);

        let err = file.write_to(&out).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
        assert!(!out.exists());
    }
}
