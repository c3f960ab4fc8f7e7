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

    /// The ordering graph has a cycle; `keys` lists every definition still
    /// blocked, sorted.
    #[error("Cyclic dependency detected among definitions: {}", keys.join(", "))]
    CyclicDependency { keys: Vec<String> },

    #[error("Definition '{0}' not found")]
    DefinitionNotFound(String),

    #[error("'{literal}' not found in '{definition}'")]
    LiteralNotFound { definition: String, literal: String },

    #[error("Marker '{marker}' not found in '{definition}'")]
    MarkerNotFound { definition: String, marker: String },

    #[error("Insert marker must not be empty")]
    EmptyMarker,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
