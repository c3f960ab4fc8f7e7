//! Mod installation and patch generation for Troubleshooter.
//!
//! - **Sessions**: [`ModSession`] merges each enabled mod into the game files
//!   in priority order, or rewrites the mods as patch scripts
//! - **Patch scripts**: [`PatchScript`] is a TOML list of edits replayed
//!   through the [`GameFiles`] interface
//! - **Dictionaries**: [`DictionaryFile`] merges line-keyed `.dic` text
//! - **Settings**: [`ModSettings`] tracks the enabled mods and their order
//! - **Detection**: [`auto_detect_game_path`] finds a Steam install
//!
//! # Example
//!
//! ```no_run
//! use tt_assets::GameLayout;
//! use tt_mod_core::{ModSession, ModSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = GameLayout::new("C:/Games/Troubleshooter");
//! let settings = ModSettings::load(layout.mods_dir().join("ModSettings.xml"))?;
//!
//! let mut session = ModSession::new(layout).with_auto_extract(["script", "xml"]);
//! let report = session.install(&settings.enabled())?;
//! println!("{} written, {} failed", report.written.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod dictionary;
pub mod error;
pub mod files;
pub mod game_path;
pub mod patch;
pub mod session;
pub mod settings;

pub use dictionary::DictionaryFile;
pub use error::{Error, Result};
pub use files::{resolve, FileKind, GameFiles, ResolvedPath};
pub use game_path::{auto_detect_game_path, is_valid_game_path};
pub use patch::{PatchOp, PatchProgram, PatchScript, Position, MAIN_PATCH, PATCH_EXTENSION};
pub use session::{FailedFile, ModData, ModSession, SessionMode, SessionReport};
pub use settings::{ModEntry, ModSettings, SETTINGS_FILE};
