// src/register.rs

//! Registration-manifest aggregation.
//!
//! Registration directives are runtime-loader metadata emitted alongside
//! packaged content. They accumulate per output manifest file across the
//! whole run, deduplicated and in first-seen order, and are flushed to
//! disk exactly once at the end. Flushing merges with whatever a previous
//! run left in the file, so incremental rebuilds only append.

use indexmap::IndexMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Per-run aggregate of registration directives keyed by manifest file.
#[derive(Debug, Default)]
pub struct RegistrationManifests {
    manifests: IndexMap<PathBuf, Vec<String>>,
}

impl RegistrationManifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directive to a manifest's ordered set; duplicates are
    /// suppressed, first-seen position kept.
    pub fn record(&mut self, manifest: &Path, directive: &str) {
        let directives = self.manifests.entry(manifest.to_path_buf()).or_default();
        if !directives.iter().any(|d| d == directive) {
            directives.push(directive.to_string());
        }
    }

    /// Directives recorded for one manifest file so far.
    pub fn directives(&self, manifest: &Path) -> Option<&[String]> {
        self.manifests.get(manifest).map(|d| d.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Write every accumulated manifest, one directive per line.
    ///
    /// Lines already present in an existing file are kept in place and
    /// not duplicated; the file is rewritten only when it gains lines.
    pub fn flush(&self) -> Result<()> {
        for (path, directives) in &self.manifests {
            let mut lines: Vec<String> = match fs::read_to_string(path) {
                Ok(existing) => existing.lines().map(str::to_string).collect(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };

            let before = lines.len();
            for directive in directives {
                if !lines.iter().any(|l| l == directive) {
                    lines.push(directive.clone());
                }
            }
            if before == lines.len() && before > 0 {
                continue;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(path)?;
            for line in &lines {
                writeln!(file, "{line}")?;
            }
            debug!("flushed {} ({} entries)", path.display(), lines.len());
        }
        Ok(())
    }
}
