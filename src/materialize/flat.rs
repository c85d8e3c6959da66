// src/materialize/flat.rs

//! Flat-tree materializer: entries become plain files under a base
//! directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use super::{ensure_parent, remove_existing, Materializer};
use crate::error::Result;

/// Writes entries directly into `<base>/<dest>`, creating parent
/// directories on demand and replacing whatever was there before.
pub struct FlatOutput {
    base: PathBuf,
}

impl FlatOutput {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Destination path with parents created; shared with the link-tree
    /// variant.
    pub(crate) fn prepare(&self, dest: &str) -> Result<PathBuf> {
        let out = ensure_parent(&self.base, dest)?;
        remove_existing(&out)?;
        Ok(out)
    }
}

impl Materializer for FlatOutput {
    fn dest_mtime(&self, dest: &str) -> Option<SystemTime> {
        fs::metadata(self.base.join(dest))
            .and_then(|m| m.modified())
            .ok()
    }

    fn write(&mut self, dest: &str, content: &[u8], _mtime: Option<SystemTime>) -> Result<()> {
        let out = self.prepare(dest)?;
        fs::write(&out, content)?;
        debug!("wrote {}", out.display());
        Ok(())
    }

    fn place(&mut self, source: &Path, dest: &str) -> Result<()> {
        let out = self.prepare(dest)?;
        fs::copy(source, &out)?;
        debug!("copied {} -> {}", source.display(), out.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let mut out = FlatOutput::new(tmp.path().join("tree"));

        out.write("deep/nested/file.txt", b"content", None).unwrap();
        let written = tmp.path().join("tree/deep/nested/file.txt");
        assert_eq!(fs::read(&written).unwrap(), b"content");
    }

    #[test]
    fn test_place_copies_bytes() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.bin");
        fs::write(&source, [0u8, 159, 146, 150]).unwrap();

        let mut out = FlatOutput::new(tmp.path().join("tree"));
        out.place(&source, "data/copy.bin").unwrap();
        assert_eq!(
            fs::read(tmp.path().join("tree/data/copy.bin")).unwrap(),
            [0u8, 159, 146, 150]
        );
    }

    #[test]
    fn test_write_replaces_existing_link() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("old-target.txt");
        fs::write(&target, b"old").unwrap();

        let base = tmp.path().join("tree");
        fs::create_dir_all(&base).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, base.join("file.txt")).unwrap();
        #[cfg(not(unix))]
        fs::write(base.join("file.txt"), b"old").unwrap();

        let mut out = FlatOutput::new(base.clone());
        out.write("file.txt", b"new", None).unwrap();

        // The destination is a regular file again and the old target is
        // untouched.
        assert_eq!(fs::read(base.join("file.txt")).unwrap(), b"new");
        assert_eq!(fs::read(&target).unwrap(), b"old");
        #[cfg(unix)]
        assert!(!base.join("file.txt").symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_needs_refresh_contract() {
        let tmp = TempDir::new().unwrap();
        let mut out = FlatOutput::new(tmp.path().join("tree"));
        let now = SystemTime::now();

        // Absent destination always refreshes.
        assert!(out.needs_refresh("missing.txt", now, false));

        out.write("present.txt", b"x", None).unwrap();
        let dest_mtime = out.dest_mtime("present.txt").unwrap();

        // Overwrite wins regardless of timestamps.
        assert!(out.needs_refresh("present.txt", dest_mtime - Duration::from_secs(60), true));
        // Strictly newer source refreshes.
        assert!(out.needs_refresh("present.txt", dest_mtime + Duration::from_secs(60), false));
        // Older (or equal) source does not.
        assert!(!out.needs_refresh("present.txt", dest_mtime - Duration::from_secs(60), false));
        assert!(!out.needs_refresh("present.txt", dest_mtime, false));
    }
}
