//! Error types for index and extraction operations.
//!
//! Per-entry failures inside an extraction batch are logged and counted in
//! the [`ExtractionReport`](crate::ExtractionReport); only failures that
//! affect the whole batch (loading or saving the index) surface as [`Error`].

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoding or encoding the index container failed.
    #[error(transparent)]
    Codec(#[from] tt_codec::Error),

    /// The decoded index is not a well-formed markup document.
    #[error(transparent)]
    Markup(#[from] tt_markup::Error),

    /// The index payload is not valid UTF-8.
    #[error("Index payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// An index entry names a storage method this pipeline does not know.
    #[error("Unknown storage method '{method}' for entry '{entry}'")]
    UnknownMethod { entry: String, method: String },

    /// An index entry lacks an attribute its storage method needs.
    #[error("Entry '{entry}' has no '{attribute}' attribute")]
    MissingAttribute { entry: String, attribute: &'static str },

    /// An entry's logical path would resolve outside `Data/`.
    #[error("Entry path escapes the data directory: {0}")]
    UnsafePath(String),

    /// The packed file an entry points at does not exist.
    #[error("Source file not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    /// A packed archive could not be opened or lacks the named member.
    #[error("Archive error in '{path}': {source}")]
    Archive {
        path: Utf8PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Index backup not found: {0}")]
    BackupNotFound(Utf8PathBuf),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
