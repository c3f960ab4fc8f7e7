//! Codec for the Troubleshooter asset index container.
//!
//! `Package/index` is an AES-128-CBC encrypted blob. Once decrypted it is
//! either the index markup itself or a zip archive holding a single `index`
//! entry. This crate turns container bytes into the logical payload and back:
//!
//! - **Decode**: decrypt, detect zip framing, neutralize NUL padding
//! - **Encode**: NUL-pad to the block size, optionally zip, encrypt
//! - **Framing memory**: a codec re-encodes with the framing it last decoded
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tt_codec::IndexCodec;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut codec = IndexCodec::new();
//! let payload = codec.load(Path::new("Package/index"))?;
//! codec.save(Path::new("Package/index"), &payload, None)?;
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod crypto;
pub mod error;

pub use container::{is_zip, read_zip_member, IndexCodec, INDEX_ENTRY_NAME, ZIP_SIGNATURE};
pub use crypto::{decrypt, encrypt, CipherKeys, BLOCK_SIZE};
pub use error::{Error, Result};
