//! Definition-level merging for the game's Lua scripts.
//!
//! A script is split into its top-level definitions (functions, `if _G[..]`
//! guards, assignments) keyed by their header. Mods are merged definition by
//! definition and the result is written back in an order where every name is
//! defined before a later definition reads it.
//!
//! # Example
//!
//! ```
//! use tt_script::{MergeMode, ScriptFile};
//!
//! let mut base = ScriptFile::from_source("base.lua", "x = 1\n");
//! base.merge_source("x = 2\ny = x + 1\n", MergeMode::Apply);
//!
//! let text = base.render().unwrap();
//! assert!(text.find("x = 2").unwrap() < text.find("y = x + 1").unwrap());
//! ```

pub mod error;
pub mod file;
pub mod order;
pub mod parse;

pub use error::{Error, Result};
pub use file::{ChangeKind, DefinitionChange, InsertPosition, MergeMode, ScriptFile};
pub use order::resolve_order;
pub use parse::{parse_definitions, strip_comments, Definitions};
