use camino::{Utf8Path, Utf8PathBuf};

/// Well-known locations inside a game installation.
///
/// ```text
/// <root>/
///   Package/index          encrypted index container
///   Package/index.backup   pristine copy taken before the first rewrite
///   Data/                  loose files
///   Mods/                  one directory per mod
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    root: Utf8PathBuf,
}

impl GameLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn package_dir(&self) -> Utf8PathBuf {
        self.root.join("Package")
    }

    pub fn index_file(&self) -> Utf8PathBuf {
        self.package_dir().join("index")
    }

    pub fn index_backup(&self) -> Utf8PathBuf {
        self.package_dir().join("index.backup")
    }

    pub fn data_dir(&self) -> Utf8PathBuf {
        self.root.join("Data")
    }

    pub fn mods_dir(&self) -> Utf8PathBuf {
        self.root.join("Mods")
    }

    /// Human-readable copy of the decoded index.
    pub fn readable_index(&self) -> Utf8PathBuf {
        self.data_dir().join("index.xml")
    }

    /// Loose-file destination for a logical path.
    pub fn loose_path(&self, logical: &str) -> Utf8PathBuf {
        self.data_dir().join(logical)
    }

    /// Physical location of a packed file named by an index entry.
    pub fn packed_path(&self, pack: &str) -> Utf8PathBuf {
        self.package_dir().join(pack)
    }
}
