//! Filesystem operations used while assembling an SDK tree.
//!
//! Removal helpers treat a missing target as success; fixups and
//! relocations run on trees where the target may legitimately be absent.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// Remove a file, symlink or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> SdkResult<()> {
    let meta = match path.symlink_metadata() {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SdkError::io("inspecting", path)(e)),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SdkError::io("removing", path)(e)),
    }
}

/// Delete `path` if present and create it again, empty.
pub fn recreate_dir(path: &Path) -> SdkResult<()> {
    remove_path(path)?;
    fs::create_dir_all(path).map_err(SdkError::io("creating directory", path))
}

/// Create a directory and its parents.
pub fn ensure_dir(path: &Path) -> SdkResult<()> {
    fs::create_dir_all(path).map_err(SdkError::io("creating directory", path))
}

/// Remove every entry in `dir` whose name matches a shell glob.
///
/// Returns the removed paths. A missing `dir` removes nothing.
pub fn remove_matching(dir: &Path, pattern: &str) -> SdkResult<Vec<PathBuf>> {
    let removed = matching_entries(dir, pattern)?;
    for path in &removed {
        remove_path(path)?;
    }
    if !removed.is_empty() {
        debug!(dir = %dir.display(), pattern, count = removed.len(), "removed");
    }
    Ok(removed)
}

fn matching_entries(dir: &Path, pattern: &str) -> SdkResult<Vec<PathBuf>> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let query = format!("{}/{}", escaped_dir.trim_end_matches('/'), pattern);
    let paths = glob::glob(&query)
        .map_err(|e| SdkError::config(format!("invalid glob '{}': {}", pattern, e)))?;
    let mut out = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            SdkError::io("matching", path)(e.into_error())
        })?;
        out.push(path);
    }
    out.sort();
    Ok(out)
}

/// Move every entry of `src` into `dst`, then nothing of `src` remains but
/// the (empty) directory itself.
///
/// An entry already present at the destination is replaced. A missing
/// `src` moves nothing, but `dst` is still created.
pub fn move_dir_contents(src: &Path, dst: &Path) -> SdkResult<usize> {
    ensure_dir(dst)?;
    let entries = match fs::read_dir(src) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(SdkError::io("reading directory", src)(e)),
    };

    let mut moved = 0;
    for entry in entries {
        let entry = entry.map_err(SdkError::io("reading directory entry in", src))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        remove_path(&to)?;
        fs::rename(&from, &to).map_err(SdkError::io("moving", &from))?;
        moved += 1;
    }
    debug!(from = %src.display(), to = %dst.display(), moved, "relocated");
    Ok(moved)
}

/// Replace `dst` wholesale with a copy of the directory tree at `src`.
///
/// Anything previously at `dst` is deleted first; the result is never a merge.
pub fn replace_tree(src: &Path, dst: &Path) -> SdkResult<()> {
    if !src.is_dir() {
        return Err(SdkError::config(format!(
            "directory not found: {}",
            src.display()
        )));
    }
    remove_path(dst)?;
    copy_dir_recursive(src, dst)
}

/// Recursively copy a directory tree
fn copy_dir_recursive(src: &Path, dst: &Path) -> SdkResult<()> {
    ensure_dir(dst)?;

    for entry in fs::read_dir(src).map_err(SdkError::io("reading directory", src))? {
        let entry = entry.map_err(SdkError::io("reading directory entry in", src))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(SdkError::io("reading file type", &src_path))?;

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(SdkError::io("reading link", &src_path))?;
            std::os::unix::fs::symlink(target, &dst_path)
                .map_err(SdkError::io("creating symlink", &dst_path))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(SdkError::io("copying", &src_path))?;
        }
    }

    Ok(())
}

/// Copy a file into `dir` (created if needed) and set its permission bits.
///
/// Returns the destination path.
pub fn install_file(src: &Path, dir: &Path, mode: u32) -> SdkResult<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| SdkError::config(format!("not a file path: {}", src.display())))?;
    ensure_dir(dir)?;
    let dst = dir.join(name);
    fs::copy(src, &dst).map_err(SdkError::io("copying", src))?;
    fs::set_permissions(&dst, fs::Permissions::from_mode(mode))
        .map_err(SdkError::io("setting permissions", &dst))?;
    Ok(dst)
}

/// Create a symlink, replacing whatever is at `link`.
pub fn force_symlink(target: &Path, link: &Path) -> SdkResult<()> {
    if let Some(parent) = link.parent() {
        ensure_dir(parent)?;
    }
    remove_path(link)?;
    std::os::unix::fs::symlink(target, link).map_err(SdkError::io("creating symlink", link))
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> SdkResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content).map_err(SdkError::io("writing", path))
}
