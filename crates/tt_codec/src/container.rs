//! The index container: cipher layer plus optional zip framing.
//!
//! ```text
//! file bytes --decrypt--> [ "PK\x03\x04" zip { "index" } | raw payload ]
//!            --NUL->space--> payload
//! ```
//!
//! Encoding reverses the steps: NUL-pad to the block size, optionally wrap in
//! a single-entry zip, encrypt.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::crypto::{neutralize_nul_padding, pad_with_nul, CipherKeys};
use crate::error::{Error, Result};

/// Local file header signature that marks an embedded archive.
pub const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Name of the single archive entry that holds the payload.
pub const INDEX_ENTRY_NAME: &str = "index";

/// Returns true if `data` starts with a zip local file header.
pub fn is_zip(data: &[u8]) -> bool {
    data.len() >= ZIP_SIGNATURE.len() && data[..ZIP_SIGNATURE.len()] == ZIP_SIGNATURE
}

/// Read one named member out of an in-memory zip.
pub fn read_zip_member(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::bad_container(format!("unreadable archive: {}", e)))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| Error::bad_container(format!("missing '{}' entry: {}", name, e)))?;

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| Error::bad_container(format!("corrupted '{}' entry: {}", name, e)))?;
    Ok(bytes)
}

/// Build a single-entry Deflate zip in memory.
pub fn write_zip_member(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(false);

    zip.start_file(name, options)?;
    zip.write_all(data).map_err(|e| Error::Zip(e.into()))?;
    Ok(zip.finish()?.into_inner())
}

/// Reversible transform between the on-disk index file and its payload.
///
/// The codec remembers whether the last decoded container was archived so a
/// later [`encode`](Self::encode) without an explicit flag writes the same
/// framing back. Each instance carries its own flag.
#[derive(Debug, Default, Clone)]
pub struct IndexCodec {
    keys: CipherKeys,
    archived: bool,
}

impl IndexCodec {
    /// Create a codec with the built-in key material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit key material.
    pub fn with_keys(keys: CipherKeys) -> Self {
        Self {
            keys,
            archived: false,
        }
    }

    /// Whether the last decoded container was zip framed.
    pub fn was_archived(&self) -> bool {
        self.archived
    }

    /// Decode container bytes into the logical payload.
    ///
    /// Trailing NUL padding is overwritten with spaces, not removed.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        let decrypted = self.keys.decrypt(bytes)?;

        let mut payload = if is_zip(&decrypted) {
            self.archived = true;
            tracing::debug!("Container is zip framed, reading '{}' entry", INDEX_ENTRY_NAME);
            read_zip_member(&decrypted, INDEX_ENTRY_NAME)?
        } else {
            self.archived = false;
            decrypted
        };

        neutralize_nul_padding(&mut payload);
        Ok(payload)
    }

    /// Encode a payload into container bytes.
    ///
    /// `archive = None` reuses the framing detected by the last
    /// [`decode`](Self::decode).
    pub fn encode(&self, payload: &[u8], archive: Option<bool>) -> Result<Vec<u8>> {
        let archive = archive.unwrap_or(self.archived);

        let mut data = payload.to_vec();
        pad_with_nul(&mut data);

        if archive {
            data = write_zip_member(INDEX_ENTRY_NAME, &data)?;
        }

        self.keys.encrypt(&data)
    }

    /// Read and decode a container file.
    pub fn load(&mut self, path: &Path) -> Result<Vec<u8>> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.decode(&bytes).map_err(|e| e.with_origin(path))
    }

    /// Encode a payload and write it to `path`.
    pub fn save(&self, path: &Path, payload: &[u8], archive: Option<bool>) -> Result<()> {
        let bytes = self.encode(payload, archive)?;
        std::fs::write(path, bytes).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Index saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn expected_after_roundtrip(payload: &[u8]) -> Vec<u8> {
        let mut expected = payload.to_vec();
        pad_with_nul(&mut expected);
        neutralize_nul_padding(&mut expected);
        expected
    }

    #[test]
    fn test_plain_roundtrip_neutralizes_padding() {
        let mut codec = IndexCodec::new();
        let payload = b"<index><entry original=\"a\"/></index>";
        let encoded = codec.encode(payload, Some(false)).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert!(!codec.was_archived());
        assert_eq!(decoded.len() % 16, 0);
        assert!(decoded.starts_with(payload));
        assert!(decoded[payload.len()..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_archive_detection_is_sticky() {
        let mut codec = IndexCodec::new();
        let encoded = codec.encode(b"<index/>", Some(true)).unwrap();

        codec.decode(&encoded).unwrap();
        assert!(codec.was_archived());

        // no explicit flag: archive framing is preserved
        let reencoded = codec.encode(b"<index/>", None).unwrap();
        let decrypted = CipherKeys::default().decrypt(&reencoded).unwrap();
        assert!(is_zip(&decrypted));
    }

    #[test]
    fn test_explicit_false_overrides_detection() {
        let mut codec = IndexCodec::new();
        let encoded = codec.encode(b"<index/>", Some(true)).unwrap();
        codec.decode(&encoded).unwrap();

        let reencoded = codec.encode(b"<index/>", Some(false)).unwrap();
        let decrypted = CipherKeys::default().decrypt(&reencoded).unwrap();
        assert!(!is_zip(&decrypted));
    }

    #[test]
    fn test_missing_entry_is_bad_container() {
        let zipped = write_zip_member("not-index", b"payload").unwrap();
        let encrypted = CipherKeys::default().encrypt(&zipped).unwrap();

        let err = IndexCodec::new().decode(&encrypted).unwrap_err();
        assert!(err.is_bad_container());
    }

    #[test]
    fn test_corrupted_archive_is_bad_container() {
        let mut garbage = ZIP_SIGNATURE.to_vec();
        garbage.extend_from_slice(&[0xAB; 60]);
        let encrypted = CipherKeys::default().encrypt(&garbage).unwrap();

        let err = IndexCodec::new().decode(&encrypted).unwrap_err();
        assert!(err.is_bad_container());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = IndexCodec::new()
            .load(&dir.path().join("index"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");

        let codec = IndexCodec::new();
        codec.save(&path, b"<index/>", Some(true)).unwrap();

        let mut reader = IndexCodec::new();
        let payload = reader.load(&path).unwrap();
        assert!(reader.was_archived());
        assert_eq!(payload, expected_after_roundtrip(b"<index/>"));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(payload in proptest::collection::vec(any::<u8>(), 0..512), archive in any::<bool>()) {
            let mut codec = IndexCodec::new();
            let encoded = codec.encode(&payload, Some(archive)).unwrap();
            let decoded = codec.decode(&encoded).unwrap();

            prop_assert_eq!(codec.was_archived(), archive);
            prop_assert_eq!(decoded, expected_after_roundtrip(&payload));
        }
    }
}
