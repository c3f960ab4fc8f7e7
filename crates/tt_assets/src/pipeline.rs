//! The asset extraction pipeline.
//!
//! [`AssetManager::extract`] materializes packed assets as loose files under
//! `Data/` and rewrites their index rows so the game reads the loose copy.
//!
//! # Algorithm
//!
//! 1. Decode `Package/index` and write `Data/index.xml` if it is missing.
//! 2. Scan entries in document order and select the ones the
//!    [`ExtractRequest`] matches. Entries already pointing at a loose file
//!    are reported as skipped without any work. In exact mode the scan stops
//!    as soon as every requested path has been found.
//! 3. Extract the selected entries on a bounded worker pool. Each task reads
//!    only its own entry and writes only its own destination file.
//! 4. After every task has finished, rewrite the rows of successful entries.
//! 5. If any row changed, back up the pristine index (best effort) and save
//!    the index once.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::index::{GameIndex, IndexEntry, StorageMethod};
use crate::layout::GameLayout;
use crate::request::{ExtractRequest, MatchMode};
use crate::utils::{files_identical, is_contained_relative, normalize_logical_path, should_copy, should_write};

/// Progress information emitted during extraction.
///
/// `current`/`total` are only meaningful during [`ExtractStage::Extracting`].
#[derive(Debug, Clone)]
pub struct ExtractProgress {
    pub stage: ExtractStage,
    /// Logical path of the entry that just finished.
    pub current_file: Option<String>,
    pub current: u32,
    pub total: u32,
}

/// Stages of the extraction pipeline, emitted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage {
    LoadingIndex,
    Scanning,
    /// One event per finished entry, from worker threads.
    Extracting,
    SavingIndex,
    Complete,
}

/// One entry that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub original: String,
    pub message: String,
}

/// Summary returned by [`AssetManager::extract`].
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Entries whose loose file was written.
    pub extracted: Vec<String>,
    /// Entries whose loose file was already identical, or that already
    /// pointed at a loose file.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedEntry>,
    /// Exact-mode requests that matched no entry.
    pub unmatched: Vec<String>,
    /// Whether the index was rewritten.
    pub index_saved: bool,
    pub elapsed: Duration,
}

/// Result of extracting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Extracted,
    Unchanged,
}

/// Entries selected by a scan of the index.
#[derive(Debug, Default)]
pub struct Selection {
    /// One entry per logical path, the first row in index order.
    pub pending: Vec<IndexEntry>,
    /// Later rows sharing a pending entry's logical path. They are rewritten
    /// when that entry succeeds but never extracted themselves.
    pub duplicates: Vec<IndexEntry>,
    pub already_loose: Vec<String>,
    pub unmatched: Vec<String>,
}

/// Select the entries `request` matches, in index order.
pub fn select_entries(entries: &[IndexEntry], request: &ExtractRequest) -> Selection {
    let mut selection = Selection::default();
    let mut remaining = request.targets().clone();
    let mut scheduled: HashSet<String> = HashSet::new();

    for entry in entries {
        let logical = entry.logical_path();
        if !request.matches(&logical) {
            continue;
        }
        if request.mode() == MatchMode::Exact {
            remaining.remove(&logical);
        }

        if entry.is_loose() {
            tracing::debug!("{} already extracted", entry.original);
            selection.already_loose.push(logical);
        } else if scheduled.insert(logical) {
            selection.pending.push(entry.clone());
        } else {
            tracing::debug!("{} listed more than once, extracting it once", entry.original);
            selection.duplicates.push(entry.clone());
        }

        if request.mode() == MatchMode::Exact && remaining.is_empty() {
            break;
        }
    }

    if request.mode() == MatchMode::Exact {
        selection.unmatched = remaining.into_iter().collect();
    }
    selection
}

/// Extracts packed assets and maintains the index backup.
///
/// # Example
///
/// ```no_run
/// use tt_assets::{AssetManager, ExtractRequest, GameLayout, MatchMode};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = AssetManager::new(GameLayout::new("/games/Troubleshooter"))
///     .with_workers(4)
///     .with_progress(|p| println!("{:?} {}/{}", p.stage, p.current, p.total));
///
/// let report = manager.extract(&ExtractRequest::parse("script/a.lua", MatchMode::Exact))?;
/// println!("{} extracted", report.extracted.len());
/// # Ok(())
/// # }
/// ```
pub struct AssetManager {
    layout: GameLayout,
    workers: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(ExtractProgress) + Send + Sync>>,
}

impl AssetManager {
    pub fn new(layout: GameLayout) -> Self {
        tracing::info!("AssetManager initialized at {}", layout.root());
        Self {
            layout,
            workers: None,
            progress_callback: None,
        }
    }

    /// Set a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ExtractProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Size of the extraction worker pool. Defaults to one per core.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Decode the index, writing a readable copy to `Data/index.xml` if it
    /// does not exist yet.
    pub fn load_index(&self) -> Result<GameIndex> {
        let index = GameIndex::load(&self.layout.index_file())?;
        index.write_readable_copy(&self.layout.readable_index());
        Ok(index)
    }

    /// Run one extraction batch.
    pub fn extract(&self, request: &ExtractRequest) -> Result<ExtractionReport> {
        let start = Instant::now();
        let mut report = ExtractionReport::default();
        if request.is_empty() {
            return Ok(report);
        }

        self.emit_progress(ExtractStage::LoadingIndex, None, 0, 0);
        let mut index = self.load_index()?;
        let pristine = !index.has_loose_entries();

        tracing::info!("Searching for extract...");
        self.emit_progress(ExtractStage::Scanning, None, 0, 0);
        let selection = select_entries(&index.entries(), request);
        report.skipped = selection.already_loose;
        report.unmatched = selection.unmatched;

        let outcomes = self.run_workers(selection.pending)?;

        let mut index_changed = false;
        let mut succeeded: HashSet<String> = HashSet::new();
        for (entry, outcome) in outcomes {
            let original = entry.logical_path();
            match outcome {
                Ok(EntryOutcome::Extracted) => {
                    tracing::info!("Extracted {}", original);
                    report.extracted.push(original);
                }
                Ok(EntryOutcome::Unchanged) => {
                    tracing::debug!("{} not changed, path updated", original);
                    report.skipped.push(original);
                }
                Err(e) => {
                    tracing::error!("Failed to extract {}: {}", entry.original, e);
                    report.failed.push(FailedEntry {
                        original,
                        message: e.to_string(),
                    });
                    continue;
                }
            }
            index_changed |= index.mark_loose(&entry);
            succeeded.insert(entry.logical_path());
        }
        for entry in &selection.duplicates {
            if succeeded.contains(&entry.logical_path()) {
                index_changed |= index.mark_loose(entry);
            }
        }

        if !report.unmatched.is_empty() {
            tracing::warn!(
                "{} files not found in index: {}",
                report.unmatched.len(),
                report.unmatched.join(", ")
            );
        }
        if report.extracted.is_empty() {
            tracing::info!("No files extracted.");
        } else {
            tracing::info!("{} entries extracted.", report.extracted.len());
        }

        if index_changed {
            self.emit_progress(ExtractStage::SavingIndex, None, 0, 0);
            if pristine {
                self.backup_before_rewrite();
            }
            index.save(&self.layout.index_file())?;
            report.index_saved = true;
            tracing::info!(
                "{} identical entries skipped; their path updated",
                report.skipped.len()
            );
        }

        report.elapsed = start.elapsed();
        self.emit_progress(ExtractStage::Complete, None, 0, 0);
        Ok(report)
    }

    /// Copy the index to `Package/index.backup` unless a backup exists.
    ///
    /// Returns whether a backup was written.
    pub fn backup_index(&self) -> Result<bool> {
        let index = self.layout.index_file();
        let backup = self.layout.index_backup();
        if backup.exists() {
            tracing::warn!("Backup already exists at {}, skipping", backup);
            return Ok(false);
        }
        fs::copy(&index, &backup).map_err(|e| Error::io(&index, e))?;
        tracing::info!("Backed up index to {}", backup);
        Ok(true)
    }

    /// Copy `Package/index.backup` over the index.
    ///
    /// Returns whether the index was replaced.
    pub fn restore_index(&self) -> Result<bool> {
        let index = self.layout.index_file();
        let backup = self.layout.index_backup();
        if !backup.exists() {
            return Err(Error::BackupNotFound(backup));
        }
        if files_identical(backup.as_std_path(), index.as_std_path()).map_err(|e| Error::io(&index, e))? {
            tracing::info!("Index already matches the backup, skipping restore");
            return Ok(false);
        }
        fs::copy(&backup, &index).map_err(|e| Error::io(&index, e))?;
        tracing::info!("Restored index from {}", backup);
        Ok(true)
    }

    fn run_workers(&self, pending: Vec<IndexEntry>) -> Result<Vec<(IndexEntry, Result<EntryOutcome>)>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = self.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;

        let total = pending.len() as u32;
        let finished = AtomicU32::new(0);
        let outcomes: Vec<(IndexEntry, Result<EntryOutcome>)> = pool.install(|| {
            pending
                .into_par_iter()
                .map(|entry| {
                    let outcome = extract_entry(&self.layout, &entry);
                    let current = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    self.emit_progress(ExtractStage::Extracting, Some(entry.logical_path()), current, total);
                    (entry, outcome)
                })
                .collect()
        });
        Ok(outcomes)
    }

    /// Best-effort backup of the untouched index before its first rewrite.
    fn backup_before_rewrite(&self) {
        let index = self.layout.index_file();
        let backup = self.layout.index_backup();
        match files_identical(index.as_std_path(), backup.as_std_path()) {
            Ok(true) => {
                tracing::debug!("Backup {} is up to date", backup);
                return;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not compare {} with {}: {}", index, backup, e),
        }
        match fs::copy(&index, &backup) {
            Ok(_) => tracing::info!("Backed up index to {}", backup),
            Err(e) => tracing::warn!("Failed to back up index to {}: {}", backup, e),
        }
    }

    fn emit_progress(&self, stage: ExtractStage, current_file: Option<String>, current: u32, total: u32) {
        if let Some(callback) = &self.progress_callback {
            callback(ExtractProgress {
                stage,
                current_file,
                current,
                total,
            });
        }
    }
}

/// Extract one entry to its loose-file destination.
pub fn extract_entry(layout: &GameLayout, entry: &IndexEntry) -> Result<EntryOutcome> {
    let method = entry.storage()?;

    let src = layout.packed_path(&normalize_logical_path(&entry.pack));
    if !src.exists() {
        return Err(Error::SourceNotFound(src));
    }

    let logical = entry.logical_path();
    if !is_contained_relative(&logical) {
        return Err(Error::UnsafePath(entry.original.clone()));
    }
    let dst = layout.loose_path(&logical);
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    match method {
        StorageMethod::Raw => {
            if !should_copy(src.as_std_path(), dst.as_std_path()).map_err(|e| Error::io(&dst, e))? {
                return Ok(EntryOutcome::Unchanged);
            }
            fs::copy(&src, &dst).map_err(|e| Error::io(&dst, e))?;
            Ok(EntryOutcome::Extracted)
        }
        StorageMethod::Zip => {
            let member = entry.member_name()?;
            let file = File::open(&src).map_err(|e| Error::io(&src, e))?;
            let data = read_member(BufReader::new(file), member, &src)?;
            write_if_changed(&data, &dst)
        }
        StorageMethod::EncryptedZip => {
            let member = entry.member_name()?;
            let encrypted = fs::read(&src).map_err(|e| Error::io(&src, e))?;
            let decrypted = tt_codec::decrypt(&encrypted).map_err(|e| e.with_origin(src.as_std_path()))?;
            let data = read_member(Cursor::new(decrypted), member, &src)?;
            write_if_changed(&data, &dst)
        }
    }
}

fn read_member<R: Read + Seek>(reader: R, name: &str, origin: &Utf8Path) -> Result<Vec<u8>> {
    let archive_error = |source| Error::Archive {
        path: origin.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(reader).map_err(archive_error)?;
    let mut member = archive.by_name(name).map_err(archive_error)?;
    let mut data = Vec::new();
    member.read_to_end(&mut data).map_err(|e| Error::io(origin, e))?;
    Ok(data)
}

fn write_if_changed(data: &[u8], dst: &Utf8Path) -> Result<EntryOutcome> {
    if !should_write(data, dst.as_std_path()).map_err(|e| Error::io(dst, e))? {
        return Ok(EntryOutcome::Unchanged);
    }
    fs::write(dst, data).map_err(|e| Error::io(dst, e))?;
    Ok(EntryOutcome::Extracted)
}
