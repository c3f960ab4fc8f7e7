use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed markup{}: {message}", path.as_ref().map(|p| format!(" in '{}'", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },

    /// Base and incoming documents have different root tags.
    #[error("Root tags differ: {base} vs {incoming}")]
    RootMismatch { base: String, incoming: String },

    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    #[error("No element matches locator '{0}'")]
    LocatorNotFound(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(message: impl std::fmt::Display) -> Self {
        Error::Parse {
            path: None,
            message: message.to_string(),
        }
    }

    pub(crate) fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            Error::Parse {
                path: None,
                message,
            } => Error::Parse {
                path: Some(file.to_path_buf()),
                message,
            },
            other => other,
        }
    }
}
