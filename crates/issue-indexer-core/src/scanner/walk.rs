use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, trace, warn};
use walkdir::WalkDir;

use crate::error::DiscoveryError;
use crate::fingerprint::modified_millis;
use crate::model::{DiscoveredFile, WriteHandle};

/// Recursive traversal of `root`, returning every `.pdf` file (case-insensitive)
/// in file-name order. Ignored globs prune whole subtrees; symlinks are skipped.
/// Relative paths exclude the root itself and always use `/`.
pub fn discover(
    root: &Path,
    ignore_globs: &[String],
    read_only: bool,
) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
    let ignore_patterns = compile_patterns(ignore_globs);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let denied = err
                    .io_error()
                    .map(|e| e.kind() == io::ErrorKind::PermissionDenied)
                    .unwrap_or(false);
                if denied {
                    error!("Access denied while scanning {}: {}", root.display(), err);
                    continue;
                }
                let path = err.path().unwrap_or(root).to_path_buf();
                return Err(DiscoveryError::Io {
                    path,
                    source: err.into(),
                });
            }
        };

        if !entry.file_type().is_file() || !has_pdf_extension(entry.path()) {
            continue;
        }

        let relative_path =
            join_components(entry.path().strip_prefix(root).unwrap_or(entry.path()));

        match describe(entry.path(), relative_path, read_only) {
            Ok(file) => files.push(file),
            Err(err) => warn!("Skipping {}: {}", entry.path().display(), err),
        }
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoDocuments {
            root: root.display().to_string(),
        });
    }
    Ok(files)
}

/// Flat selection of files. Non-PDF paths are ignored; the relative path of
/// each file is just its name.
pub fn discover_files(
    paths: &[PathBuf],
    read_only: bool,
) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
    select_files(paths, None, read_only)
}

/// Like [`discover_files`], but files inside `root` get the same relative path
/// a full [`discover`] of `root` would give them, so their fingerprints match.
pub fn discover_files_within(
    root: &Path,
    paths: &[PathBuf],
    read_only: bool,
) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
    let root = fs::canonicalize(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    select_files(paths, Some(&root), read_only)
}

fn select_files(
    paths: &[PathBuf],
    root: Option<&Path>,
    read_only: bool,
) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
    let mut files = Vec::new();

    for path in paths.iter().filter(|p| has_pdf_extension(p)) {
        let relative_path = root
            .and_then(|root| relative_to(root, path))
            .unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        let file = describe(path, relative_path, read_only).map_err(|source| {
            DiscoveryError::Io {
                path: path.clone(),
                source,
            }
        })?;
        files.push(file);
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoDocuments {
            root: "the selected files".to_string(),
        });
    }
    Ok(files)
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let absolute = fs::canonicalize(path).ok()?;
    let relative = absolute.strip_prefix(root).ok()?;
    Some(join_components(relative))
}

fn join_components(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn describe(path: &Path, relative_path: String, read_only: bool) -> io::Result<DiscoveredFile> {
    let metadata = fs::metadata(path)?;
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let write_handle = if read_only || metadata.permissions().readonly() {
        None
    } else {
        Some(WriteHandle::new(absolute.clone()))
    };
    trace!(
        "Discovered {} ({} bytes, writable: {})",
        relative_path,
        metadata.len(),
        write_handle.is_some()
    );

    Ok(DiscoveredFile {
        path: absolute,
        relative_path,
        size: metadata.len(),
        last_modified: modified_millis(&metadata),
        write_handle,
    })
}

fn compile_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
