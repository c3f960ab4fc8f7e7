use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Game path is not configured")]
    #[diagnostic(
        code(config::game_path_missing),
        help("Run 'troubletool config set-game-path <dir>' or 'troubletool config auto-detect'")
    )]
    GamePathNotSet,

    #[error("Invalid game path: {}", path.display())]
    #[diagnostic(
        code(config::invalid_game_path),
        help("The game folder is the one that contains the 'Package' directory")
    )]
    InvalidGamePath { path: PathBuf },

    #[error("Nothing to extract")]
    #[diagnostic(
        code(extract::empty_request),
        help("Pass comma separated paths, e.g. 'troubletool extract script,xml/Item.xml'")
    )]
    EmptyExtractRequest,

    #[error("File not found: {}", path.display())]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: PathBuf },

    #[error("Failed to save config: {source}")]
    #[diagnostic(code(config::save_failed), help("Check file permissions next to the executable"))]
    ConfigSave {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(index::codec))]
    Codec(#[from] tt_codec::Error),

    #[error(transparent)]
    #[diagnostic(code(index::markup), help("The index must be a single well-formed markup document"))]
    Markup(#[from] tt_markup::Error),

    #[error(transparent)]
    #[diagnostic(code(assets::failed))]
    Assets(#[from] tt_assets::Error),

    #[error(transparent)]
    #[diagnostic(code(mods::failed))]
    Mods(#[from] tt_mod_core::Error),

    #[error("IO operation failed on {}", path.display())]
    #[diagnostic(code(io::operation_failed))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn invalid_game_path(path: impl Into<PathBuf>) -> Self {
        Self::InvalidGamePath { path: path.into() }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
