//! Path normalization and loose-file comparison helpers.

use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Component, Utf8Path};

/// Normalize a logical path: trim whitespace, use forward slashes.
pub fn normalize_logical_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

/// Whether a logical path stays inside the directory it is joined onto: not
/// empty, not absolute, no drive prefix and no `..` step.
pub fn is_contained_relative(path: &str) -> bool {
    let path = Utf8Path::new(path);
    path.components().next().is_some()
        && path.components().all(|component| match component {
            Utf8Component::Normal(part) => !part.contains(':'),
            Utf8Component::CurDir => true,
            _ => false,
        })
}

/// Final component of a logical or packed path, accepting either separator.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether copying `src` over `dst` would change `dst`.
///
/// True when `dst` is missing, the sizes differ, or the contents differ.
pub fn should_copy(src: &Path, dst: &Path) -> io::Result<bool> {
    let dst_meta = match fs::metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    if fs::metadata(src)?.len() != dst_meta.len() {
        return Ok(true);
    }
    Ok(fs::read(src)? != fs::read(dst)?)
}

/// Whether writing `data` to `dst` would change `dst`.
pub fn should_write(data: &[u8], dst: &Path) -> io::Result<bool> {
    match fs::read(dst) {
        Ok(existing) => Ok(existing != data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

/// Byte-for-byte comparison of two files. A missing file compares unequal.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if !a.exists() || !b.exists() {
        return Ok(false);
    }
    Ok(!should_copy(a, b)?)
}
