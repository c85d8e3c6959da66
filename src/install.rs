// src/install.rs

//! Declarative install manifests for the build-graph-driven path.
//!
//! An install manifest maps destination paths to actions (copy, symlink,
//! pattern-symlink, preprocess) and is consumed by a later installation
//! stage. Destinations are unique per target; the overwrite-tolerant
//! variant relaxes that to last-write-wins with a warning, because
//! upstream declarations legitimately target the same destination from
//! two different build-graph objects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};
use crate::preprocess::{Defines, Marker};

/// One install action for a destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum InstallAction {
    /// Copy the source file's bytes.
    Copy { source: PathBuf },
    /// Link the destination to the source.
    Symlink { source: PathBuf },
    /// Link every file matching `pattern` under `base` into the
    /// destination directory.
    PatternSymlink { base: PathBuf, pattern: String },
    /// Preprocess the source into the destination, tracking consumed
    /// includes in a dependency file.
    Preprocess {
        source: PathBuf,
        depfile: PathBuf,
        #[serde(default)]
        defines: Defines,
        marker: Marker,
    },
}

/// Strict install manifest: destinations are unique.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InstallManifest {
    entries: BTreeMap<String, InstallAction>,
}

impl InstallManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action for a destination; a destination seen twice is
    /// an error.
    pub fn add(&mut self, dest: &str, action: InstallAction) -> Result<()> {
        if self.entries.contains_key(dest) {
            return Err(Error::DuplicateDestination(dest.to_string()));
        }
        self.entries.insert(dest.to_string(), action);
        Ok(())
    }

    pub fn get(&self, dest: &str) -> Option<&InstallAction> {
        self.entries.get(dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstallAction)> {
        self.entries.iter()
    }

    /// Serialize to the on-disk JSON format.
    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)
            .map_err(|e| Error::Config(format!("install manifest serialization: {e}")))?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn replace(&mut self, dest: &str, action: InstallAction) {
        self.entries.insert(dest.to_string(), action);
    }
}

/// Overwrite-tolerant policy over a strict [`InstallManifest`]: a
/// duplicate destination is warned about and replaced, never fatal.
#[derive(Debug, Default)]
pub struct OverwriteInstallManifest {
    inner: InstallManifest,
    overwrites: usize,
}

impl OverwriteInstallManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, keeping the most recently added record for a
    /// destination seen twice.
    pub fn add(&mut self, dest: &str, action: InstallAction) {
        if self.inner.get(dest).is_some() {
            warn!("item already in manifest: {dest}");
            self.overwrites += 1;
        }
        self.inner.replace(dest, action);
    }

    /// Number of destinations that were re-registered (and warned about).
    pub fn overwrite_count(&self) -> usize {
        self.overwrites
    }

    pub fn add_copy(&mut self, source: &Path, dest: &str) {
        self.add(dest, InstallAction::Copy { source: source.to_path_buf() });
    }

    pub fn add_symlink(&mut self, source: &Path, dest: &str) {
        self.add(dest, InstallAction::Symlink { source: source.to_path_buf() });
    }

    pub fn add_pattern_symlink(&mut self, base: &Path, pattern: &str, dest: &str) {
        self.add(
            dest,
            InstallAction::PatternSymlink {
                base: base.to_path_buf(),
                pattern: pattern.to_string(),
            },
        );
    }

    pub fn add_preprocess(
        &mut self,
        source: &Path,
        dest: &str,
        depfile: &Path,
        defines: Defines,
        marker: Marker,
    ) {
        self.add(
            dest,
            InstallAction::Preprocess {
                source: source.to_path_buf(),
                depfile: depfile.to_path_buf(),
                defines,
                marker,
            },
        );
    }

    pub fn manifest(&self) -> &InstallManifest {
        &self.inner
    }

    pub fn into_inner(self) -> InstallManifest {
        self.inner
    }
}

/// Process-wide set of install manifests, one per install target, flushed
/// to disk exactly once at the end of a run.
#[derive(Debug, Default)]
pub struct InstallManifestSet {
    targets: IndexMap<String, OverwriteInstallManifest>,
}

impl InstallManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest for an install target, created on first use.
    pub fn target(&mut self, target: &str) -> &mut OverwriteInstallManifest {
        self.targets.entry(target.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Write one manifest file per install target under `dir`, the
    /// target's path separators flattened into the file name.
    pub fn write_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (target, manifest) in &self.targets {
            let name = format!("install_{}.json", target.replace('/', "_"));
            let mut file = fs::File::create(dir.join(name))?;
            manifest.manifest().write_to(&mut file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_rejects_duplicate_destination() {
        let mut manifest = InstallManifest::new();
        manifest
            .add("bin/app", InstallAction::Copy { source: "src/app".into() })
            .unwrap();
        let err = manifest
            .add("bin/app", InstallAction::Copy { source: "other/app".into() })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDestination(_)));
        // The original record is untouched.
        assert_eq!(
            manifest.get("bin/app"),
            Some(&InstallAction::Copy { source: "src/app".into() })
        );
    }

    #[test]
    fn test_tolerant_keeps_last_write() {
        let mut manifest = OverwriteInstallManifest::new();
        manifest.add_symlink(Path::new("first/f.js"), "modules/f.js");
        manifest.add_symlink(Path::new("second/f.js"), "modules/f.js");

        assert_eq!(manifest.manifest().len(), 1);
        assert_eq!(manifest.overwrite_count(), 1);
        assert_eq!(
            manifest.manifest().get("modules/f.js"),
            Some(&InstallAction::Symlink { source: "second/f.js".into() })
        );
    }

    #[test]
    fn test_action_kinds_roundtrip_through_json() {
        let mut manifest = OverwriteInstallManifest::new();
        manifest.add_copy(Path::new("src/a"), "a");
        manifest.add_symlink(Path::new("src/b"), "b");
        manifest.add_pattern_symlink(Path::new("src/images"), "*.png", "images");
        manifest.add_preprocess(
            Path::new("src/p.js"),
            "p.js",
            Path::new(".deps/p.js.pp"),
            Defines::new(),
            Marker::Hash,
        );

        let mut buffer = Vec::new();
        manifest.manifest().write_to(&mut buffer).unwrap();
        let parsed: InstallManifest = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed.get("images"),
            Some(&InstallAction::PatternSymlink {
                base: "src/images".into(),
                pattern: "*.png".into(),
            })
        );
    }

    #[test]
    fn test_set_writes_one_file_per_target() {
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let mut set = InstallManifestSet::new();
        set.target("dist/bin").add_copy(Path::new("src/a"), "a");
        set.target("dist/bin/browser").add_copy(Path::new("src/b"), "b");
        set.write_all(tmp.path()).unwrap();

        assert!(tmp.path().join("install_dist_bin.json").is_file());
        assert!(tmp.path().join("install_dist_bin_browser.json").is_file());
    }
}
