// src/resolve.rs

//! Source resolution: ordered search paths, the locale overlay, and
//! wildcard expansion.
//!
//! A source reference is resolved against a [`SearchContext`], an ordered
//! list of candidate base directories where the first directory containing
//! the file wins. Locale sources always resolve through the locale overlay
//! sequence, absolute sources through the top source directory, everything
//! else through the declared source directories followed by the object
//! directory.

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::ManifestEntry;

/// Locale directory used when no localized source tree applies.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Ordered candidate-directory list used to resolve one source reference.
#[derive(Debug, Clone)]
pub struct SearchContext {
    dirs: Vec<PathBuf>,
}

impl SearchContext {
    /// Locale mode: the precomputed locale overlay sequence.
    pub fn locale(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Absolute mode: the top source directory only. The caller strips the
    /// leading separator from the source reference.
    pub fn absolute(top_src_dir: &Path) -> Self {
        Self {
            dirs: vec![top_src_dir.to_path_buf()],
        }
    }

    /// Relative mode: declared source directories, then the object
    /// directory, in that order.
    pub fn relative(source_dirs: &[PathBuf], object_dir: &Path) -> Self {
        let mut dirs = source_dirs.to_vec();
        dirs.push(object_dir.to_path_buf());
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Find the first directory containing `source`.
    pub fn resolve(&self, source: &str) -> Result<PathBuf> {
        for dir in &self.dirs {
            let candidate = dir.join(source);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::SourceNotFound {
            src: source.to_string(),
            searched: self.dirs.clone(),
        })
    }
}

/// Compute the locale overlay sequence.
///
/// The overlay is built from the merge directory (when localization-merge
/// is configured), the base localization directory (when configured), and
/// the default-locale directory under the top source tree. The default
/// locale participates when merging or when no base directory is
/// configured; a pure localized build without merge must not see it.
///
/// A relative source directory ending in `locales` is stripped to its
/// parent for the merge/base joins.
pub fn locale_overlay(
    top_src_dir: &Path,
    relative_src_dir: &str,
    base: Option<&Path>,
    merge: Option<&Path>,
    default_locale: &str,
) -> Vec<PathBuf> {
    let rel = Path::new(relative_src_dir);
    let stripped = match rel.file_name() {
        Some(name) if name == "locales" => rel.parent().unwrap_or(rel),
        _ => rel,
    };

    let mut dirs = Vec::new();
    if let Some(merge) = merge {
        dirs.push(merge.join(stripped));
    }
    if let Some(base) = base {
        dirs.push(base.join(stripped));
    }
    if merge.is_some() || base.is_none() {
        dirs.push(top_src_dir.join(relative_src_dir).join(default_locale));
    }
    dirs
}

/// True when the source reference needs wildcard expansion.
pub fn is_wildcard(source: &str) -> bool {
    source.contains('*')
}

/// Longest leading run of path segments without a wildcard, with a
/// trailing separator (empty when the first segment already has one).
pub fn wildcard_prefix(source: &str) -> String {
    let mut prefix = String::new();
    for segment in source.split('/') {
        if segment.contains('*') {
            break;
        }
        prefix.push_str(segment);
        prefix.push('/');
    }
    prefix
}

/// Expand a wildcard entry into concrete entries.
///
/// Every directory of the search context is enumerated in declared order,
/// files sorted within each; a match at relative path `p` becomes an entry
/// with destination `output` joined with `p` minus the fixed prefix. The
/// synthesized source is the match's path relative to its search
/// directory, so later resolution walks the same precedence order.
pub fn expand_wildcard(
    entry: &ManifestEntry,
    source: &str,
    context: &SearchContext,
) -> Result<Vec<ManifestEntry>> {
    let pattern = Pattern::new(source)
        .map_err(|e| Error::Config(format!("bad wildcard {:?}: {}", source, e)))?;
    // `*` is allowed to cross path separators, matching whole subtrees.
    let options = MatchOptions {
        require_literal_separator: false,
        ..MatchOptions::new()
    };
    let prefix = wildcard_prefix(source);

    let mut expanded = Vec::new();
    for dir in context.dirs() {
        let root = dir.join(&prefix);
        if !root.is_dir() {
            continue;
        }
        let walk = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());
        for found in walk {
            let Ok(rel) = found.path().strip_prefix(dir) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if !pattern.matches_with(&rel, options) {
                continue;
            }
            let suffix = &rel[prefix.len()..];
            let output = join_dest(&entry.output, suffix);
            expanded.push(entry.with_paths(output, rel));
        }
    }
    Ok(expanded)
}

fn join_dest(base: &str, suffix: &str) -> String {
    if base.is_empty() {
        suffix.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), suffix)
    }
}
