use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Assets(#[from] tt_assets::Error),

    #[error(transparent)]
    Script(#[from] tt_script::Error),

    #[error(transparent)]
    Markup(#[from] tt_markup::Error),

    #[error("Failed to parse patch script '{path}': {source}")]
    PatchParse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize patch script: {0}")]
    PatchSerialize(#[from] toml::ser::Error),

    /// A script operation gave both `code` and `from_file`, or neither.
    #[error("Operation on '{key}' needs exactly one of 'code' or 'from_file'")]
    CodeSource { key: String },

    #[error("Dictionary line has no '#' key: {0:?}")]
    InvalidDictionaryLine(String),

    #[error("Base file not found for '{0}'")]
    BaseNotFound(Utf8PathBuf),

    #[error("Mod settings error: {0}")]
    Settings(String),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
