//! The decoded asset index.
//!
//! The index payload is a markup document whose root holds one element per
//! asset:
//!
//! ```xml
//! <index>
//!     <file original="script/a.lua" pack="bundle.zip" method="zip" virtual="a.lua" size="12" csize="9"/>
//! </index>
//! ```
//!
//! `original` is the logical path, `pack` the physical location relative to
//! `Package/`, and `method` one of the [`StorageMethod`] tags. An entry whose
//! `pack` basename equals its `original` basename already points at a loose
//! file.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use tt_codec::IndexCodec;
use tt_markup::{Document, Element, Node};

use crate::error::{Error, Result};
use crate::utils::{base_name, normalize_logical_path};

/// Prefix every rewritten `pack` attribute starts with.
pub const LOOSE_PACK_PREFIX: &str = "../Data/";

/// How an entry's payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageMethod {
    /// The packed file is the payload.
    Raw,
    /// The payload is a member of a plain zip archive.
    Zip,
    /// The payload is a member of a zip archive encrypted with the index cipher.
    EncryptedZip,
}

impl StorageMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMethod::Raw => "raw",
            StorageMethod::Zip => "zip",
            StorageMethod::EncryptedZip => "encrypted_zip",
        }
    }
}

impl fmt::Display for StorageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(StorageMethod::Raw),
            "zip" => Ok(StorageMethod::Zip),
            "encrypted_zip" => Ok(StorageMethod::EncryptedZip),
            other => Err(other.to_string()),
        }
    }
}

/// Snapshot of one index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Raw child position under the index root.
    pub position: usize,
    /// Logical path as written in the index.
    pub original: String,
    pub pack: String,
    pub method: Option<String>,
    pub virtual_name: Option<String>,
    pub size: Option<String>,
}

impl IndexEntry {
    fn from_element(position: usize, element: &Element) -> Option<Self> {
        Some(Self {
            position,
            original: element.attribute("original")?.to_string(),
            pack: element.attribute("pack")?.to_string(),
            method: element.attribute("method").map(str::to_string),
            virtual_name: element.attribute("virtual").map(str::to_string),
            size: element.attribute("size").map(str::to_string),
        })
    }

    /// Logical path with forward slashes.
    pub fn logical_path(&self) -> String {
        normalize_logical_path(&self.original)
    }

    /// Whether the entry already points at a loose file.
    pub fn is_loose(&self) -> bool {
        base_name(&self.pack) == base_name(&self.original)
    }

    /// The parsed storage method.
    pub fn storage(&self) -> Result<StorageMethod> {
        let method = self.method.as_deref().ok_or_else(|| Error::MissingAttribute {
            entry: self.original.clone(),
            attribute: "method",
        })?;
        method.parse().map_err(|method| Error::UnknownMethod {
            entry: self.original.clone(),
            method,
        })
    }

    /// Name of the archive member holding the payload.
    pub fn member_name(&self) -> Result<&str> {
        self.virtual_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::MissingAttribute {
                entry: self.original.clone(),
                attribute: "virtual",
            })
    }
}

/// The decoded index plus the codec that read it.
///
/// Saving goes through the same codec instance so the zip framing detected
/// on load is written back.
#[derive(Debug, Clone)]
pub struct GameIndex {
    codec: IndexCodec,
    document: Document,
}

impl GameIndex {
    /// Decode and parse the index container at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let mut codec = IndexCodec::new();
        let payload = codec.load(path.as_std_path())?;
        let index = Self::from_payload(codec, &payload)?;
        tracing::info!("Loaded index from {}", path);
        Ok(index)
    }

    /// Parse an already decoded payload.
    pub fn from_payload(codec: IndexCodec, payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)?;
        let document = Document::parse(text)?;
        Ok(Self { codec, document })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn codec(&self) -> &IndexCodec {
        &self.codec
    }

    /// Entries that carry both `original` and `pack`, in document order.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.document
            .root
            .children
            .iter()
            .enumerate()
            .filter_map(|(position, node)| match node {
                Node::Element(element) => IndexEntry::from_element(position, element),
                _ => None,
            })
            .collect()
    }

    /// Whether any entry was already rewritten by an earlier extraction.
    pub fn has_loose_entries(&self) -> bool {
        self.document
            .root
            .elements()
            .filter_map(|element| element.attribute("pack"))
            .any(|pack| pack.starts_with(LOOSE_PACK_PREFIX))
    }

    /// Point an entry at its loose copy under `Data/`.
    ///
    /// Returns whether any attribute changed.
    pub fn mark_loose(&mut self, entry: &IndexEntry) -> bool {
        let Some(element) = self.document.root.element_at_mut(entry.position) else {
            return false;
        };

        let logical = entry.logical_path();
        let csize = entry.size.clone().unwrap_or_else(|| "0".to_string());
        let updates = [
            ("method", StorageMethod::Raw.as_str().to_string()),
            ("pack", format!("{}{}", LOOSE_PACK_PREFIX, logical)),
            ("virtual", base_name(&logical).to_string()),
            ("csize", csize),
        ];

        let mut changed = false;
        for (name, value) in updates {
            if element.attribute(name) != Some(value.as_str()) {
                element.set_attribute(name, value);
                changed = true;
            }
        }
        changed
    }

    /// Serialized markup payload.
    pub fn to_payload(&self) -> Vec<u8> {
        self.document.to_markup().into_bytes()
    }

    /// Encode and write the index, keeping the framing it was loaded with.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        self.codec.save(path.as_std_path(), &self.to_payload(), None)?;
        Ok(())
    }

    /// Write a readable copy to `path` unless one already exists.
    ///
    /// A write failure is logged, never returned.
    pub fn write_readable_copy(&self, path: &Utf8Path) {
        if path.exists() {
            return;
        }
        let result = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| std::fs::write(path, self.to_payload()));
        if let Err(e) = result {
            tracing::error!("Error writing {}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> GameIndex {
        GameIndex::from_payload(IndexCodec::new(), text.as_bytes()).unwrap()
    }

    #[test]
    fn test_entries_skip_incomplete_rows() {
        let index = index(
            r#"<index><file original="a.lua" pack="p.zip" method="zip"/><file pack="x"/><file original="b"/></index>"#,
        );
        let entries = index.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, 0);
        assert_eq!(entries[0].storage().unwrap(), StorageMethod::Zip);
        assert!(entries[0].member_name().is_err());
    }

    #[test]
    fn test_unknown_and_missing_method() {
        let index = index(
            r#"<index><file original="a" pack="p" method="lz4"/><file original="b" pack="q"/></index>"#,
        );
        let entries = index.entries();
        assert!(matches!(entries[0].storage(), Err(Error::UnknownMethod { ref method, .. }) if method == "lz4"));
        assert!(matches!(
            entries[1].storage(),
            Err(Error::MissingAttribute { attribute: "method", .. })
        ));
    }

    #[test]
    fn test_mark_loose_rewrites_entry() {
        let mut index = index(
            r#"<index><file original="script\a.lua" pack="bundle.zip" method="zip" virtual="x" size="12" csize="9"/></index>"#,
        );
        assert!(!index.has_loose_entries());

        let entry = index.entries().remove(0);
        assert!(!entry.is_loose());
        assert!(index.mark_loose(&entry));
        assert!(!index.mark_loose(&index.entries().remove(0)));

        let element = index.document().root.element_at(0).unwrap();
        assert_eq!(element.attribute("method"), Some("raw"));
        assert_eq!(element.attribute("pack"), Some("../Data/script/a.lua"));
        assert_eq!(element.attribute("virtual"), Some("a.lua"));
        assert_eq!(element.attribute("csize"), Some("12"));
        assert!(index.has_loose_entries());
        assert!(index.entries()[0].is_loose());
    }

    #[test]
    fn test_mark_loose_defaults_csize() {
        let mut index = index(r#"<index><file original="a.txt" pack="p" method="raw"/></index>"#);
        let entry = index.entries().remove(0);
        index.mark_loose(&entry);
        assert_eq!(index.document().root.element_at(0).unwrap().attribute("csize"), Some("0"));
    }
}
