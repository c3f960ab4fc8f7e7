use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::dom::{Document, Element};
use crate::error::Result;
use crate::merge::{merge, ChangeRecord, MergeMode};

/// A markup file loaded for merging.
///
/// The dialect is chosen from the file extension at load time.
#[derive(Debug, Clone)]
pub struct MarkupFile {
    path: PathBuf,
    dialect: Dialect,
    document: Document,
    original: Element,
    changes: Vec<ChangeRecord>,
}

impl MarkupFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::open(path)?;
        Ok(Self::from_document(path, document))
    }

    pub fn from_document(path: impl Into<PathBuf>, document: Document) -> Self {
        let path = path.into();
        Self {
            dialect: Dialect::for_path(&path),
            original: document.root.clone(),
            document,
            path,
            changes: Vec::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn root(&self) -> &Element {
        &self.document.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.document.root
    }

    pub fn is_modified(&self) -> bool {
        self.document.root != self.original
    }

    /// Changes recorded by the last [`MergeMode::Record`] merge.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn take_changes(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.changes)
    }

    /// Merge another file from disk into this one.
    pub fn merge_with(&mut self, path: impl AsRef<Path>, mode: MergeMode) -> Result<()> {
        let incoming = Document::open(path)?;
        self.merge_document(&incoming, mode)
    }

    /// Merge a parsed document into this one.
    pub fn merge_document(&mut self, incoming: &Document, mode: MergeMode) -> Result<()> {
        self.changes.clear();
        self.changes = merge(&mut self.document.root, &incoming.root, &self.dialect, mode)?;
        Ok(())
    }

    /// Write the document if it changed since load. Returns whether it wrote.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        let path = path.as_ref();
        self.document.save(path)?;
        tracing::info!("Wrote {}", path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    #[test]
    fn test_merge_and_write() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.xml");
        let update = dir.path().join("update.xml");
        std::fs::write(&base, r#"<root><item id="1" v="a"/></root>"#).unwrap();
        std::fs::write(&update, r#"<root><item id="1" v="b"/></root>"#).unwrap();

        let mut file = MarkupFile::open(&base).unwrap();
        assert!(!file.write_to(&base).unwrap());

        file.merge_with(&update, MergeMode::Apply).unwrap();
        assert!(file.write_to(&base).unwrap());

        let written = std::fs::read_to_string(&base).unwrap();
        assert_eq!(
            written,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root>\n\t<item id=\"1\" v=\"b\"/>\n</root>\n"
        );
    }

    #[test]
    fn test_record_keeps_document() {
        let mut file = MarkupFile::from_document(
            "xml/a.xml",
            Document::parse(r#"<root><item id="1"/></root>"#).unwrap(),
        );
        let incoming = Document::parse(r#"<root><item id="2"/></root>"#).unwrap();

        file.merge_document(&incoming, MergeMode::Record).unwrap();
        assert!(!file.is_modified());
        assert_eq!(file.changes().len(), 1);
        assert_eq!(file.take_changes().len(), 1);
        assert!(file.changes().is_empty());
    }

    #[test]
    fn test_root_mismatch_is_reported() {
        let mut file = MarkupFile::from_document("a.xml", Document::parse("<a/>").unwrap());
        let err = file
            .merge_document(&Document::parse("<b/>").unwrap(), MergeMode::Apply)
            .unwrap_err();
        assert!(matches!(err, Error::RootMismatch { .. }));
    }

    #[test]
    fn test_stage_extension_picks_stage_dialect() {
        let file = MarkupFile::from_document("stage/m.stage", Document::parse("<Stage/>").unwrap());
        assert!(file.dialect().is_stage());
    }
}
