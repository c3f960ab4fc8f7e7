//! Markup documents and the tree merger for the game's data files.
//!
//! - **Document model**: an owned element tree parsed with `quick-xml` and
//!   written back with tab indentation
//! - **Dialects**: per-file-family rules deciding which nodes are "the same"
//! - **Merge**: walk base and incoming trees in lock-step and either mutate
//!   the base or record [`ChangeRecord`]s addressed by [`Locator`]s
//!
//! # Example
//!
//! ```
//! use tt_markup::{merge, Dialect, Document, MergeMode};
//!
//! let mut base = Document::parse(r#"<items><item id="1" v="a"/></items>"#).unwrap();
//! let incoming = Document::parse(r#"<items><item id="1" v="b"/><item id="2"/></items>"#).unwrap();
//!
//! let records = merge(&mut base.root, &incoming.root, &Dialect::generic(), MergeMode::Record).unwrap();
//! assert_eq!(records.len(), 2);
//! ```

pub mod dialect;
pub mod dom;
pub mod error;
pub mod file;
pub mod locator;
pub mod merge;

pub use dialect::{Dialect, Identity, NodeKey};
pub use dom::{parse_fragment, write_fragment, Attributes, Document, Element, Node};
pub use error::{Error, Result};
pub use file::MarkupFile;
pub use locator::{Locator, Segment};
pub use merge::{merge, ChangeRecord, MergeMode};
