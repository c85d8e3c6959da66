// src/materialize/link.rs

//! Link-tree materializer: entries become links to their resolved
//! sources instead of copies.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use super::{FlatOutput, Materializer};
use crate::error::Result;

/// Flat-tree variant whose `place` links to the source rather than
/// copying bytes. Preprocessed content is still written as plain files.
pub struct LinkOutput {
    inner: FlatOutput,
}

impl LinkOutput {
    pub fn new(base: PathBuf) -> Self {
        Self {
            inner: FlatOutput::new(base),
        }
    }
}

impl Materializer for LinkOutput {
    fn dest_mtime(&self, dest: &str) -> Option<SystemTime> {
        self.inner.dest_mtime(dest)
    }

    fn write(&mut self, dest: &str, content: &[u8], mtime: Option<SystemTime>) -> Result<()> {
        self.inner.write(dest, content, mtime)
    }

    fn place(&mut self, source: &Path, dest: &str) -> Result<()> {
        let out = self.inner.prepare(dest)?;
        link(source, &out)?;
        debug!("linked {} -> {}", out.display(), source.display());
        Ok(())
    }
}

#[cfg(unix)]
fn link(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

// Platforms without a symlink primitive fall back to a hard link.
#[cfg(not(unix))]
fn link(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::hard_link(source, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_place_links_to_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.txt");
        fs::write(&source, b"linked content").unwrap();

        let base = tmp.path().join("tree");
        let mut out = LinkOutput::new(base.clone());
        out.place(&source, "sub/dest.txt").unwrap();

        let dest = base.join("sub/dest.txt");
        assert_eq!(fs::read(&dest).unwrap(), b"linked content");
        #[cfg(unix)]
        {
            let meta = dest.symlink_metadata().unwrap();
            assert!(meta.file_type().is_symlink());
            assert_eq!(fs::read_link(&dest).unwrap(), source);
        }
    }

    #[test]
    fn test_place_replaces_stale_link() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old.txt");
        let new = tmp.path().join("new.txt");
        fs::write(&old, b"old").unwrap();
        fs::write(&new, b"new").unwrap();

        let base = tmp.path().join("tree");
        let mut out = LinkOutput::new(base.clone());
        out.place(&old, "dest.txt").unwrap();
        out.place(&new, "dest.txt").unwrap();

        assert_eq!(fs::read(base.join("dest.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_preprocessed_content_is_a_regular_file() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("tree");
        let mut out = LinkOutput::new(base.clone());

        out.write("gen/output.js", b"expanded", None).unwrap();
        let dest = base.join("gen/output.js");
        assert_eq!(fs::read(&dest).unwrap(), b"expanded");
        assert!(!dest.symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_existing_link_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.txt");
        fs::write(&source, b"content").unwrap();
        let source_mtime = fs::metadata(&source).unwrap().modified().unwrap();

        let mut out = LinkOutput::new(tmp.path().join("tree"));
        out.place(&source, "dest.txt").unwrap();

        // The link resolves to the source, so their times match and no
        // refresh is needed.
        assert!(!out.needs_refresh("dest.txt", source_mtime, false));
        assert!(out.needs_refresh("dest.txt", source_mtime, true));
    }
}
