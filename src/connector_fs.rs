//! Local document discovery for explicit `ask` inputs.
//!
//! Each input path is either a file, taken as-is, or a directory, which is
//! walked and filtered through the configured include globs. Directory
//! contents are sorted so discovery order (and therefore ranking tie-break
//! order) is deterministic.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{missing_path, Error, Result};

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/manifests/**", "**/.*.tmp"];

/// Expand files and directories into an ordered, de-duplicated file list.
pub fn expand_document_paths(inputs: &[PathBuf], include_globs: &[String]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(DEFAULT_EXCLUDES)?;

    let mut out: Vec<PathBuf> = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(missing_path(input));
        }
        if input.is_file() {
            push_unique(&mut out, input.clone());
            continue;
        }
        for path in scan_dir(input, &include_set, &exclude_set)? {
            push_unique(&mut out, path);
        }
    }
    Ok(out)
}

fn scan_dir(root: &Path, include_set: &GlobSet, exclude_set: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn push_unique(out: &mut Vec<PathBuf>, path: PathBuf) {
    if !out.contains(&path) {
        out.push(path);
    }
}

fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern.as_ref())
            .map_err(|e| Error::validation(format!("invalid glob '{}': {}", pattern.as_ref(), e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::validation(format!("invalid glob set: {}", e)))
}
