//! Installing mods and turning them into patch scripts.
//!
//! A [`ModSession`] walks each mod's directory, merges every file it finds
//! into the matching game file and keeps the merged files in memory until
//! [`flush`](ModSession::flush) writes them in parallel. Mods are processed
//! in the order given, so later mods win on conflicting definitions and
//! attributes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::map::Entry;
use indexmap::IndexMap;
use rayon::prelude::*;
use tt_assets::utils::normalize_logical_path;
use tt_assets::{AssetManager, ExtractProgress, ExtractRequest, ExtractionReport, GameLayout, MatchMode};
use tt_markup::MarkupFile;
use tt_script::ScriptFile;
use walkdir::WalkDir;

use crate::dictionary::DictionaryFile;
use crate::error::{Error, Result};
use crate::files::{resolve, FileKind, GameFiles};
use crate::patch::{PatchProgram, PatchScript, MAIN_PATCH, PATCH_EXTENSION};

/// What a session does with each mod file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Merge into the game files and write them.
    Install,
    /// Replace mergeable mod files with patch scripts.
    CreatePatch,
}

impl SessionMode {
    fn script_mode(self) -> tt_script::MergeMode {
        match self {
            SessionMode::Install => tt_script::MergeMode::Apply,
            SessionMode::CreatePatch => tt_script::MergeMode::Record,
        }
    }

    fn markup_mode(self) -> tt_markup::MergeMode {
        match self {
            SessionMode::Install => tt_markup::MergeMode::Apply,
            SessionMode::CreatePatch => tt_markup::MergeMode::Record,
        }
    }
}

/// The files one mod contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModData {
    pub name: String,
    /// Directory the relative paths are relative to.
    pub root: Utf8PathBuf,
    /// Logical paths with `/` separators, sorted.
    pub files: Vec<String>,
    /// Directory holding `main.tpatch`, when the mod ships one.
    pub main: Option<Utf8PathBuf>,
}

#[derive(Debug, Default)]
struct Collection {
    mods: Vec<ModData>,
    extract_paths: BTreeSet<String>,
    has_patch_scripts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of an install or create-patch run.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub mods: Vec<String>,
    /// Game files rewritten by the final flush.
    pub written: Vec<PathBuf>,
    /// Patch scripts and dictionary files written in create-patch mode.
    pub patches: Vec<PathBuf>,
    pub failed: Vec<FailedFile>,
    pub extraction: Option<ExtractionReport>,
}

impl SessionReport {
    fn fail(&mut self, path: impl AsRef<Path>, error: &Error) {
        let path = path.as_ref();
        tracing::error!("{}: {}", path.display(), error);
        self.failed.push(FailedFile {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }
}

enum Pending {
    Script(ScriptFile),
    Markup(MarkupFile),
    Dictionary(DictionaryFile),
}

impl Pending {
    fn path(&self) -> &Path {
        match self {
            Pending::Script(file) => file.path(),
            Pending::Markup(file) => file.path(),
            Pending::Dictionary(file) => file.path(),
        }
    }

    fn write(&self) -> Result<bool> {
        Ok(match self {
            Pending::Script(file) => file.write_to(file.path())?,
            Pending::Markup(file) => file.write_to(file.path())?,
            Pending::Dictionary(file) => file.write_to(file.path())?,
        })
    }
}

/// Applies mods to a game installation.
///
/// # Example
///
/// ```no_run
/// use tt_assets::GameLayout;
/// use tt_mod_core::ModSession;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = ModSession::new(GameLayout::new("C:/Games/Troubleshooter"))
///     .with_auto_extract(["script", "stage", "xml"]);
/// let report = session.install(&["BetterLoot".to_string()])?;
/// println!("{} files written", report.written.len());
/// # Ok(())
/// # }
/// ```
pub struct ModSession {
    assets: AssetManager,
    auto_extract: Vec<String>,
    scripts: IndexMap<String, ScriptFile>,
    markups: IndexMap<String, MarkupFile>,
    dictionaries: IndexMap<String, DictionaryFile>,
}

impl ModSession {
    pub fn new(layout: GameLayout) -> Self {
        Self {
            assets: AssetManager::new(layout),
            auto_extract: Vec::new(),
            scripts: IndexMap::new(),
            markups: IndexMap::new(),
            dictionaries: IndexMap::new(),
        }
    }

    /// Prefixes extracted before mods are applied. Nothing is extracted
    /// while this list is empty.
    pub fn with_auto_extract<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_extract = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.assets = self.assets.with_workers(workers);
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ExtractProgress) + Send + Sync + 'static,
    {
        self.assets = self.assets.with_progress(callback);
        self
    }

    pub fn layout(&self) -> &GameLayout {
        self.assets.layout()
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn install(&mut self, names: &[String]) -> Result<SessionReport> {
        tracing::info!("Preparing install of {} mod(s)", names.len());
        let report = self.run(names, SessionMode::Install)?;
        tracing::info!(
            "Install done: {} written, {} failed",
            report.written.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub fn create_patch(&mut self, names: &[String]) -> Result<SessionReport> {
        tracing::info!("Preparing patch creation for {} mod(s)", names.len());
        let report = self.run(names, SessionMode::CreatePatch)?;
        tracing::info!(
            "Patch creation done: {} written, {} failed",
            report.patches.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn run(&mut self, names: &[String], mode: SessionMode) -> Result<SessionReport> {
        let collection = self.collect(names);
        if collection.mods.is_empty() {
            tracing::warn!("No mods found.");
            return Ok(SessionReport::default());
        }

        let mut report = SessionReport {
            mods: collection.mods.iter().map(|m| m.name.clone()).collect(),
            extraction: self.prepare_assets(&collection, mode)?,
            ..Default::default()
        };

        self.clear_cache();
        self.process(&collection.mods, mode, &mut report);
        Ok(report)
    }

    /// Gather the files of every named mod that exists.
    fn collect(&self, names: &[String]) -> Collection {
        let mut collection = Collection::default();

        for name in names {
            let mod_dir = self.layout().mods_dir().join(name);
            if !mod_dir.is_dir() {
                tracing::warn!("Mod '{}' not found in Mods folder.", name);
                continue;
            }
            let data_dir = mod_dir.join("Data");
            let root = if data_dir.is_dir() { data_dir } else { mod_dir };

            let data = collect_mod(name, root);
            if data.main.is_none() && data.files.is_empty() {
                tracing::debug!("Mod '{}' has no files", name);
                continue;
            }

            for file in &data.files {
                match Utf8Path::new(file).extension() {
                    Some(PATCH_EXTENSION) => collection.has_patch_scripts = true,
                    Some("dic" | "dkm") => {}
                    _ => {
                        collection.extract_paths.insert(file.clone());
                    }
                }
            }
            if data.main.is_some() {
                collection.has_patch_scripts = true;
            }
            collection.mods.push(data);
        }

        collection
    }

    fn prepare_assets(&self, collection: &Collection, mode: SessionMode) -> Result<Option<ExtractionReport>> {
        if self.auto_extract.is_empty() {
            return Ok(None);
        }

        let request = if collection.has_patch_scripts && mode == SessionMode::Install {
            ExtractRequest::from_paths(&self.auto_extract, MatchMode::Prefix)
        } else if !collection.extract_paths.is_empty() {
            ExtractRequest::from_paths(&collection.extract_paths, MatchMode::Exact)
        } else {
            return Ok(None);
        };

        Ok(Some(self.assets.extract(&request)?))
    }

    fn process(&mut self, mods: &[ModData], mode: SessionMode, report: &mut SessionReport) {
        for data in mods {
            if let Some(dir) = &data.main {
                if mode == SessionMode::Install {
                    tracing::debug!("Running {} in mod: {}", MAIN_PATCH, data.name);
                    self.flush(report);
                    self.run_patch_file(&dir.join(MAIN_PATCH), dir.join("lua"), report);
                }
                continue;
            }

            tracing::debug!("Processing files for mod: '{}'", data.name);
            for rel in &data.files {
                let mod_file = data.root.join(rel);
                match Utf8Path::new(rel).extension() {
                    Some(PATCH_EXTENSION) => {
                        if mode == SessionMode::Install {
                            self.run_patch_file(&mod_file, data.root.join("lua"), report);
                        }
                    }
                    Some("lua") => {
                        if let Err(e) = self.merge_script(rel, &mod_file, mode, report) {
                            report.fail(&mod_file, &e);
                        }
                    }
                    Some("dic") => {
                        if let Err(e) = self.merge_dictionary(rel, &mod_file, mode, report) {
                            report.fail(&mod_file, &e);
                        }
                    }
                    _ => {
                        if let Err(e) = self.merge_markup(rel, &mod_file, mode, report) {
                            report.fail(&mod_file, &e);
                        }
                    }
                }
            }
        }

        if mode == SessionMode::Install {
            tracing::info!("Save changes...");
            self.flush(report);
        }
    }

    /// The game file a mod file merges into.
    fn base_file(&self, rel: &str) -> Utf8PathBuf {
        match Utf8Path::new(rel).extension() {
            Some("dic" | "dkm") => self.layout().root().join(rel),
            _ => self.layout().data_dir().join(rel),
        }
    }

    fn merge_script(&mut self, rel: &str, mod_file: &Utf8Path, mode: SessionMode, report: &mut SessionReport) -> Result<()> {
        let base = self.base_file(rel);
        let file = cached(&mut self.scripts, rel, &base, |p| Ok(ScriptFile::open(p)?))?;
        file.merge_with(mod_file, mode.script_mode())?;

        if mode == SessionMode::CreatePatch {
            let script = PatchScript::from_script_changes(rel, file.take_changes());
            self.emit_patch(script, mod_file, report)?;
        }
        Ok(())
    }

    fn merge_markup(&mut self, rel: &str, mod_file: &Utf8Path, mode: SessionMode, report: &mut SessionReport) -> Result<()> {
        let base = self.base_file(rel);
        let file = cached(&mut self.markups, rel, &base, |p| Ok(MarkupFile::open(p)?))?;
        file.merge_with(mod_file, mode.markup_mode())?;

        if mode == SessionMode::CreatePatch {
            let script = PatchScript::from_markup_changes(rel, file.take_changes());
            self.emit_patch(script, mod_file, report)?;
        }
        Ok(())
    }

    fn merge_dictionary(
        &mut self,
        rel: &str,
        mod_file: &Utf8Path,
        mode: SessionMode,
        report: &mut SessionReport,
    ) -> Result<()> {
        let base = self.base_file(rel);
        let file = cached(&mut self.dictionaries, rel, &base, |p| DictionaryFile::open(p))?;
        file.merge_with(mod_file, mode.script_mode())?;

        if mode == SessionMode::Install {
            return Ok(());
        }

        let changes = file.take_changes();
        if changes.is_empty() {
            tracing::debug!("{} makes no changes", mod_file);
            return Ok(());
        }
        let text: String = changes.into_values().collect();
        if std::fs::read_to_string(mod_file).is_ok_and(|existing| existing == text) {
            tracing::debug!("{} not changed, skip", mod_file);
            return Ok(());
        }
        std::fs::write(mod_file, text).map_err(|e| Error::io(mod_file, e))?;
        tracing::info!("Rewritten {}", mod_file);
        report.patches.push(mod_file.as_std_path().to_path_buf());
        Ok(())
    }

    /// Replace `mod_file` with a sibling patch script.
    fn emit_patch(&self, script: PatchScript, mod_file: &Utf8Path, report: &mut SessionReport) -> Result<()> {
        if script.is_empty() {
            tracing::debug!("{} makes no changes", mod_file);
            return Ok(());
        }

        let patch_file = mod_file.with_extension(PATCH_EXTENSION);
        if script.save(&patch_file)? {
            tracing::info!("Rewritten {} as {}", mod_file, patch_file);
            report.patches.push(patch_file.into_std_path_buf());
        } else {
            tracing::debug!("{} not changed, skip", patch_file);
        }
        std::fs::remove_file(mod_file).map_err(|e| Error::io(mod_file, e))?;
        Ok(())
    }

    fn run_patch_file(&mut self, path: &Utf8Path, code_dir: Utf8PathBuf, report: &mut SessionReport) {
        tracing::info!("Running patch: {}", path);
        let result = PatchScript::open(path).and_then(|script| {
            let script = script.with_code_dir(code_dir);
            self.run_program(&script)
        });
        if let Err(e) = result {
            report.fail(path, &e);
        }
    }

    /// Run a patch program against this session's cached files.
    pub fn run_program(&mut self, program: &dyn PatchProgram) -> Result<()> {
        program.run(self)
    }

    /// Write every cached file that changed, in parallel, then drop the
    /// caches.
    pub fn flush(&mut self, report: &mut SessionReport) {
        let pending: Vec<Pending> = self
            .scripts
            .drain(..)
            .map(|(_, f)| Pending::Script(f))
            .chain(self.markups.drain(..).map(|(_, f)| Pending::Markup(f)))
            .chain(self.dictionaries.drain(..).map(|(_, f)| Pending::Dictionary(f)))
            .collect();

        let results: Vec<(PathBuf, Result<bool>)> = pending
            .par_iter()
            .map(|file| (file.path().to_path_buf(), file.write()))
            .collect();

        for (path, result) in results {
            match result {
                Ok(true) => report.written.push(path),
                Ok(false) => tracing::debug!("No changes in {}", path.display()),
                Err(e) => report.fail(&path, &e),
            }
        }
    }

    fn clear_cache(&mut self) {
        self.scripts.clear();
        self.markups.clear();
        self.dictionaries.clear();
    }
}

impl GameFiles for ModSession {
    fn script(&mut self, path: &str) -> Result<&mut ScriptFile> {
        let resolved = resolve(self.layout(), FileKind::Script, path);
        cached(&mut self.scripts, &resolved.key, &resolved.file, |p| Ok(ScriptFile::open(p)?))
    }

    fn markup(&mut self, path: &str) -> Result<&mut MarkupFile> {
        let resolved = resolve(self.layout(), FileKind::Markup, path);
        cached(&mut self.markups, &resolved.key, &resolved.file, |p| Ok(MarkupFile::open(p)?))
    }

    fn dictionary(&mut self, path: &str) -> Result<&mut DictionaryFile> {
        let resolved = resolve(self.layout(), FileKind::Dictionary, path);
        cached(&mut self.dictionaries, &resolved.key, &resolved.file, |p| DictionaryFile::open(p))
    }
}

/// Look up a handle by key, opening `file` on first use.
fn cached<'a, T>(
    cache: &'a mut IndexMap<String, T>,
    key: &str,
    file: &Utf8Path,
    open: impl FnOnce(&Utf8Path) -> Result<T>,
) -> Result<&'a mut T> {
    match cache.entry(normalize_logical_path(key)) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            if !file.is_file() {
                return Err(Error::BaseNotFound(file.to_path_buf()));
            }
            Ok(entry.insert(open(file)?))
        }
    }
}

/// Walk one mod root. `lua/` directories hold code for patch scripts and are
/// skipped; a `main.tpatch` anywhere takes over the whole mod.
fn collect_mod(name: &str, root: Utf8PathBuf) -> ModData {
    let mut files = Vec::new();

    let walker = WalkDir::new(root.as_std_path())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == "lua"))
        .filter_map(|x| x.ok());

    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            tracing::warn!("Skipping non UTF-8 path {}", entry.path().display());
            continue;
        };

        if path.file_name() == Some(MAIN_PATCH) {
            let dir = path.parent().map(Utf8Path::to_path_buf).unwrap_or_else(|| root.clone());
            return ModData {
                name: name.to_string(),
                root: dir.clone(),
                files: Vec::new(),
                main: Some(dir),
            };
        }

        if let Ok(rel) = path.strip_prefix(&root) {
            files.push(normalize_logical_path(rel.as_str()));
        }
    }

    files.sort();
    ModData {
        name: name.to_string(),
        root,
        files,
        main: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tt_markup::Document;

    struct Game {
        _dir: TempDir,
        layout: GameLayout,
    }

    impl Game {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
            fs::create_dir_all(root.join("Package")).unwrap();
            Self {
                _dir: dir,
                layout: GameLayout::new(root),
            }
        }

        fn write(&self, rel: &str, text: &str) -> Utf8PathBuf {
            let path = self.layout.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, text).unwrap();
            path
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.layout.root().join(rel)).unwrap()
        }

        fn session(&self) -> ModSession {
            ModSession::new(self.layout.clone())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_install_merges_in_mod_order() {
        let game = Game::new();
        game.write("Data/xml/Item.xml", r#"<Items><Item id="1" v="a"/></Items>"#);
        game.write("Mods/first/Data/xml/Item.xml", r#"<Items><Item id="1" v="b"/><Item id="2"/></Items>"#);
        game.write("Mods/second/xml/Item.xml", r#"<Items><Item id="1" v="c"/></Items>"#);

        let report = game.session().install(&names(&["first", "second"])).unwrap();

        assert_eq!(report.mods, names(&["first", "second"]));
        assert!(report.failed.is_empty());
        assert_eq!(report.written.len(), 1);
        assert_eq!(
            Document::parse(&game.read("Data/xml/Item.xml")).unwrap().root,
            Document::parse(r#"<Items><Item id="1" v="c"/><Item id="2"/></Items>"#).unwrap().root
        );
    }

    #[test]
    fn test_install_merges_scripts_and_dictionaries() {
        let game = Game::new();
        game.write("Data/script/a.lua", "x = 1\n");
        game.write("Dictionary/eng/text.dic", "#1\tHello\n#2\tWorld\n");
        game.write("Mods/m/Data/script/a.lua", "x = 2\ny = 3\n");
        game.write("Mods/m/Data/Dictionary/eng/text.dic", "#2\tEarth\n");

        let report = game.session().install(&names(&["m"])).unwrap();

        assert!(report.failed.is_empty());
        assert_eq!(game.read("Data/script/a.lua"), "-- UPDATE\nx = 2\n-- NEW\ny = 3\n");
        assert_eq!(game.read("Dictionary/eng/text.dic"), "#1\tHello\n#2\tEarth\n");
    }

    #[test]
    fn test_missing_base_is_reported_per_file() {
        let game = Game::new();
        game.write("Data/xml/A.xml", "<A/>");
        game.write("Mods/m/xml/Missing.xml", "<A/>");
        game.write("Mods/m/xml/A.xml", r#"<A><b id="1"/></A>"#);

        let report = game.session().install(&names(&["m", "absent"])).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("Missing.xml"));
        assert_eq!(report.written.len(), 1);
    }

    #[test]
    fn test_no_mods_found() {
        let game = Game::new();
        let report = game.session().install(&names(&["absent"])).unwrap();
        assert!(report.mods.is_empty());
        assert!(report.extraction.is_none());
    }

    #[test]
    fn test_create_patch_replays_to_direct_install() {
        let base = r#"<Items><Item id="1" v="a"/><Group name="g"><e id="x"/></Group></Items>"#;
        let incoming = r#"<Items><Item id="1" v="b"/><Group name="g"><e id="y"/></Group><Item id="3"/></Items>"#;

        let direct = Game::new();
        direct.write("Data/xml/Item.xml", base);
        direct.write("Mods/m/xml/Item.xml", incoming);
        direct.session().install(&names(&["m"])).unwrap();

        let patched = Game::new();
        patched.write("Data/xml/Item.xml", base);
        let mod_file = patched.write("Mods/m/xml/Item.xml", incoming);

        let report = patched.session().create_patch(&names(&["m"])).unwrap();
        assert_eq!(report.patches.len(), 1);
        assert!(!mod_file.exists());
        assert!(mod_file.with_extension("tpatch").exists());
        assert_eq!(patched.read("Data/xml/Item.xml"), base);

        patched.session().install(&names(&["m"])).unwrap();
        assert_eq!(patched.read("Data/xml/Item.xml"), direct.read("Data/xml/Item.xml"));
    }

    #[test]
    fn test_create_patch_script_and_dictionary() {
        let game = Game::new();
        game.write("Data/script/a.lua", "x = 1\n");
        game.write("Dictionary/eng/text.dic", "#1\tHello\n#2\tWorld\n");
        let lua = game.write("Mods/m/script/a.lua", "x = 2\n");
        let unchanged = game.write("Mods/m/script/b.lua", "z = 1\n");
        game.write("Data/script/b.lua", "z = 1\n");
        let dic = game.write("Mods/m/Dictionary/eng/text.dic", "#1\tHello\n#2\tEarth\n");

        let report = game.session().create_patch(&names(&["m"])).unwrap();

        assert!(report.failed.is_empty());
        assert!(!lua.exists());
        let script = PatchScript::open(lua.with_extension("tpatch")).unwrap();
        assert_eq!(script.ops.len(), 1);
        assert!(unchanged.exists());
        assert_eq!(fs::read_to_string(&dic).unwrap(), "#2\tEarth\n");

        // a second run finds nothing new to write
        let again = game.session().create_patch(&names(&["m"])).unwrap();
        assert!(again.patches.is_empty());

        game.session().install(&names(&["m"])).unwrap();
        assert_eq!(game.read("Data/script/a.lua"), "x = 2\n");
        assert_eq!(game.read("Dictionary/eng/text.dic"), "#1\tHello\n#2\tEarth\n");
    }

    #[test]
    fn test_main_patch_takes_over_mod() {
        let game = Game::new();
        game.write("Data/xml/A.xml", r#"<A><b id="1" v="1"/></A>"#);
        game.write("Data/script/s.lua", "function f()\n  step()\nend\n");
        game.write("Mods/first/xml/A.xml", r#"<A><b id="2"/></A>"#);
        game.write("Mods/m/Data/ignored.xml", "<not merged/>");
        game.write(
            "Mods/m/Data/patch/main.tpatch",
            r#"
[[op]]
kind = "set_attributes"
file = "xml/A"
locator = 'b[@id="1"]'
attributes = { v = "2" }

[[op]]
kind = "insert_code"
file = "script/s"
key = "function f"
marker = "step()"
from_file = "log"
"#,
        );
        game.write("Mods/m/Data/patch/lua/log.lua", "  log()");

        let report = game.session().install(&names(&["first", "m"])).unwrap();

        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(
            Document::parse(&game.read("Data/xml/A.xml")).unwrap().root,
            Document::parse(r#"<A><b id="1" v="2"/><b id="2"/></A>"#).unwrap().root
        );
        assert_eq!(game.read("Data/script/s.lua"), "function f()\n  step()\n  log()\nend\n");
    }

    #[test]
    fn test_collect_skips_lua_dirs() {
        let game = Game::new();
        game.write("Mods/m/b.xml", "<b/>");
        game.write("Mods/m/lua/code.lua", "x = 1");
        game.write("Mods/m/script/a.lua", "x = 1");
        game.write("Mods/m/fix.tpatch", "");
        game.write("Mods/m/Dictionary/eng/t.dic", "#1\ta");

        let collection = game.session().collect(&names(&["m"]));
        assert_eq!(
            collection.mods[0].files,
            names(&["Dictionary/eng/t.dic", "b.xml", "fix.tpatch", "script/a.lua"])
        );
        assert!(collection.has_patch_scripts);
        assert_eq!(
            collection.extract_paths.into_iter().collect::<Vec<_>>(),
            names(&["b.xml", "script/a.lua"])
        );
    }

    #[test]
    fn test_game_files_cache_by_logical_path() {
        let game = Game::new();
        game.write("Data/script/a.lua", "x = 1\n");
        let mut session = game.session();

        session.script("script/a").unwrap().add_definition("y", "y = 2");
        assert_eq!(session.script("script\\a.lua").unwrap().get("y"), Some("y = 2"));

        let err = session.markup("xml/Nope").unwrap_err();
        assert!(matches!(err, Error::BaseNotFound(_)));
    }
}
