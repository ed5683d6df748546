//! Filesystem scanner for `quilt import`.
//!
//! Walks a directory, keeps files that match the include globs and none of
//! the exclude globs, and reads each as UTF-8 text. `.git`, `target`, and
//! `node_modules` trees are always skipped.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::json;
use std::path::Path;
use walkdir::WalkDir;

/// One file ready to become a document.
#[derive(Debug, Clone)]
pub struct FileItem {
    /// Path relative to the scan root, `/`-separated.
    pub relative_path: String,
    /// File name.
    pub title: String,
    pub content: String,
}

impl FileItem {
    pub fn metadata(&self) -> serde_json::Value {
        json!({
            "path": self.relative_path,
            "title": self.title,
            "source": "filesystem",
        })
    }
}

pub fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

/// Scan `root`, returning matching files sorted by relative path.
///
/// An empty `include` list means [`default_include_globs`]. Files that are
/// not valid UTF-8 are skipped with a warning.
pub fn scan_directory(root: &Path, include: &[String], exclude: &[String]) -> Result<Vec<FileItem>> {
    if !root.is_dir() {
        bail!("Import root is not a directory: {}", root.display());
    }

    let include_set = if include.is_empty() {
        build_globset(&default_include_globs())?
    } else {
        build_globset(include)?
    };

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(exclude.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut items = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %rel_str, error = %e, "skipping unreadable file");
                continue;
            }
        };

        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        items.push(FileItem {
            relative_path: rel_str,
            title,
            content,
        });
    }

    // Sort for deterministic ordering
    items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(items)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
