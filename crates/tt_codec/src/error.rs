//! Error types for container operations.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or encoding a container.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed while reading or writing a container file.
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container file does not exist.
    #[error("Container file not found: {0}")]
    NotFound(PathBuf),

    /// The ciphertext could not be processed (wrong length, bad padding).
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// The decrypted bytes carry an archive signature but the archive or its
    /// `index` entry cannot be read.
    #[error("Bad container{}: {message}", origin.as_ref().map(|p| format!(" '{}'", p.display())).unwrap_or_default())]
    BadContainer {
        origin: Option<PathBuf>,
        message: String,
    },

    /// Building the archive frame failed.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn bad_container(message: impl Into<String>) -> Self {
        Error::BadContainer {
            origin: None,
            message: message.into(),
        }
    }

    /// Attach the originating file to errors that do not name one yet.
    pub fn with_origin(self, path: &std::path::Path) -> Self {
        match self {
            Error::BadContainer {
                origin: None,
                message,
            } => Error::BadContainer {
                origin: Some(path.to_path_buf()),
                message,
            },
            other => other,
        }
    }

    /// Returns true for the distinct "bad container" format failure.
    pub fn is_bad_container(&self) -> bool {
        matches!(self, Error::BadContainer { .. })
    }
}
