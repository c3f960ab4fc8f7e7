//! Line-keyed dictionary files (`.dic`).
//!
//! A line whose left-trimmed text starts with `#` is keyed by its first
//! tab-separated field (`#17\tHello` has key `#17`). Other lines are kept
//! as they are and never merged.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tt_script::MergeMode;

use crate::error::{Error, Result};

fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if !line.starts_with('#') {
        return None;
    }
    line.split('\t').next()
}

/// Keyed lines of `text` in order, each left-trimmed and newline-terminated.
fn keyed_lines(text: &str) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for line in text.split_inclusive('\n') {
        let Some(key) = line_key(line) else {
            continue;
        };
        map.insert(key.to_string(), terminated(line.trim_start()));
    }
    map
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{}\n", line)
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryFile {
    path: PathBuf,
    lines: Vec<String>,
    keys: IndexMap<String, usize>,
    original: Vec<String>,
    changes: IndexMap<String, String>,
}

impl DictionaryFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_text(path, &text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut keys = IndexMap::new();
        for (position, line) in lines.iter().enumerate() {
            if let Some(key) = line_key(line) {
                keys.insert(key.to_string(), position);
            }
        }
        Self {
            path: path.into(),
            original: lines.clone(),
            lines,
            keys,
            changes: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(|&i| self.lines[i].as_str())
    }

    pub fn is_modified(&self) -> bool {
        self.lines != self.original
    }

    /// Lines recorded by [`MergeMode::Record`] merges, by key.
    pub fn changes(&self) -> &IndexMap<String, String> {
        &self.changes
    }

    pub fn take_changes(&mut self) -> IndexMap<String, String> {
        std::mem::take(&mut self.changes)
    }

    /// Replace the line with the same key, or append it.
    pub fn set_line(&mut self, line: &str) -> Result<()> {
        let key = line_key(line).ok_or_else(|| Error::InvalidDictionaryLine(line.to_string()))?;
        let key = key.to_string();
        self.upsert(key, terminated(line.trim_start()));
        Ok(())
    }

    fn upsert(&mut self, key: String, line: String) {
        match self.keys.get(&key) {
            Some(&position) => self.lines[position] = line,
            None => {
                if let Some(last) = self.lines.last_mut() {
                    if !last.ends_with('\n') {
                        last.push('\n');
                    }
                }
                self.keys.insert(key, self.lines.len());
                self.lines.push(line);
            }
        }
    }

    pub fn merge_with(&mut self, path: impl AsRef<Path>, mode: MergeMode) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.merge_text(&text, mode);
        Ok(())
    }

    /// Merge keyed lines that are new or differ from the current ones.
    pub fn merge_text(&mut self, text: &str, mode: MergeMode) {
        for (key, line) in keyed_lines(text) {
            let current = self.get(&key).map(|l| terminated(l.trim_start()));
            if current.as_deref() == Some(line.as_str()) {
                continue;
            }
            match mode {
                MergeMode::Apply => self.upsert(key, line),
                MergeMode::Record => {
                    self.changes.insert(key, line);
                }
            }
        }
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }

    /// Write the file if it changed since load. Returns whether it wrote.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        let path = path.as_ref();
        std::fs::write(path, self.render()).map_err(|e| Error::io(path, e))?;
        tracing::info!("Wrote {}", path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "// header\n#1\tHello\n  #2\tWorld\n";

    #[test]
    fn test_apply_replaces_and_appends() {
        let mut file = DictionaryFile::from_text("a.dic", BASE);
        file.merge_text("#2\tEarth\n#3\tNew", MergeMode::Apply);

        assert!(file.is_modified());
        assert_eq!(file.render(), "// header\n#1\tHello\n#2\tEarth\n#3\tNew\n");
        assert!(file.changes().is_empty());
    }

    #[test]
    fn test_record_collects_changed_lines_only() {
        let mut file = DictionaryFile::from_text("a.dic", BASE);
        file.merge_text("#1\tHello\n#2\tEarth\nplain\n", MergeMode::Record);

        assert!(!file.is_modified());
        let changes: Vec<(&str, &str)> = file.changes().iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(changes, vec![("#2", "#2\tEarth\n")]);
    }

    #[test]
    fn test_identical_merge_is_noop() {
        let mut file = DictionaryFile::from_text("a.dic", BASE);
        file.merge_text(BASE, MergeMode::Apply);
        assert!(!file.is_modified());
    }

    #[test]
    fn test_set_line() {
        let mut file = DictionaryFile::from_text("a.dic", "#1\tA");
        file.set_line("#1\tB").unwrap();
        file.set_line("#9\tZ").unwrap();
        assert_eq!(file.render(), "#1\tB\n#9\tZ\n");
        assert!(matches!(file.set_line("no key"), Err(Error::InvalidDictionaryLine(_))));
    }

    #[test]
    fn test_write_to_only_when_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.dic");
        std::fs::write(&path, BASE).unwrap();

        let mut file = DictionaryFile::open(&path).unwrap();
        assert!(!file.write_to(&path).unwrap());
        file.set_line("#1\tHi").unwrap();
        assert!(file.write_to(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// header\n#1\tHi\n  #2\tWorld\n");
    }
}
