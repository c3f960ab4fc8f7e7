//! Asset index model and extraction pipeline for Troubleshooter game data.
//!
//! The game ships its assets packed inside archives listed by an encrypted
//! index (`Package/index`). This crate:
//!
//! - **Models the index**: [`GameIndex`] decodes it with `tt_codec` and
//!   exposes its rows as [`IndexEntry`] values
//! - **Extracts assets**: [`AssetManager::extract`] writes matching entries
//!   to `Data/` on a worker pool and rewrites their rows to point there
//! - **Backs up the index**: [`AssetManager::backup_index`] and
//!   [`AssetManager::restore_index`]
//!
//! # Example
//!
//! ```no_run
//! use tt_assets::{AssetManager, ExtractRequest, GameLayout, MatchMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = AssetManager::new(GameLayout::new("C:/Games/Troubleshooter"));
//! let report = manager.extract(&ExtractRequest::parse("script, stage", MatchMode::Prefix))?;
//! println!(
//!     "extracted {}, skipped {}, failed {}",
//!     report.extracted.len(),
//!     report.skipped.len(),
//!     report.failed.len()
//! );
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod index;
pub mod layout;
pub mod pipeline;
pub mod request;
pub mod utils;

pub use error::{Error, Result};
pub use index::{GameIndex, IndexEntry, StorageMethod, LOOSE_PACK_PREFIX};
pub use layout::GameLayout;
pub use pipeline::{
    extract_entry, select_entries, AssetManager, EntryOutcome, ExtractProgress, ExtractStage, ExtractionReport,
    FailedEntry, Selection,
};
pub use request::{ExtractRequest, MatchMode};
