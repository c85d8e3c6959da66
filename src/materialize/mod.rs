// src/materialize/mod.rs

//! Output materializers: the three interchangeable strategies that write
//! resolved entries to disk.
//!
//! All three share one contract: report the destination's recorded
//! modification time, write content at a destination, and place a source
//! file at a destination. The archive variant batches entries into a
//! single locked container file; the flat and link variants write
//! directly to the filesystem.

mod archive;
mod flat;
mod link;

pub use archive::ArchiveOutput;
pub use flat::FlatOutput;
pub use link::LinkOutput;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Artifact shape selected for one packaging run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One compressed container file per section.
    #[default]
    Archive,
    /// A flat directory tree per section.
    Flat,
    /// A tree of symbolic (or hard) links per section.
    Link,
}

impl OutputFormat {
    /// Construct the materializer for one section under `out_dir`.
    pub fn create(&self, out_dir: &Path, name: &str) -> Result<Box<dyn Materializer>> {
        match self {
            OutputFormat::Archive => {
                let container = out_dir.join(format!("{name}.pkg"));
                Ok(Box::new(ArchiveOutput::open(&container)?))
            }
            OutputFormat::Flat => Ok(Box::new(FlatOutput::new(out_dir.join(name)))),
            OutputFormat::Link => Ok(Box::new(LinkOutput::new(out_dir.join(name)))),
        }
    }

    /// Base path recorded in registration directives for a section,
    /// pointing into the artifact this format produces.
    pub fn register_base(&self, prefix: &str, name: &str) -> String {
        match self {
            OutputFormat::Archive => format!("pkg:{prefix}{name}.pkg!/"),
            OutputFormat::Flat | OutputFormat::Link => format!("{prefix}{name}/"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "archive" => Ok(OutputFormat::Archive),
            "flat" => Ok(OutputFormat::Flat),
            "link" => Ok(OutputFormat::Link),
            other => Err(Error::Config(format!(
                "unknown output format {other:?} (expected archive, flat, or link)"
            ))),
        }
    }
}

/// Common contract of the three output strategies.
///
/// Destinations are `/`-separated paths relative to the section's
/// namespace. Every write path goes through [`needs_refresh`] first;
/// skipping the check is a correctness bug, not an optimization.
///
/// [`needs_refresh`]: Materializer::needs_refresh
pub trait Materializer {
    /// Recorded modification time of a destination, `None` when absent.
    fn dest_mtime(&self, dest: &str) -> Option<SystemTime>;

    /// Write content at a destination, recording `mtime` where the
    /// strategy keeps per-entry metadata.
    fn write(&mut self, dest: &str, content: &[u8], mtime: Option<SystemTime>) -> Result<()>;

    /// Record the resolved source file at a destination: copy its bytes,
    /// or link to it where the strategy supports that.
    fn place(&mut self, source: &Path, dest: &str) -> Result<()>;

    /// Close the output. Called once per section; also invoked on the
    /// error path so a partly-written container is not left locked.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Freshness contract shared by all strategies: refresh when forced,
    /// when the destination is absent, or when the source is strictly
    /// newer than the recorded destination time.
    fn needs_refresh(&self, dest: &str, source_mtime: SystemTime, overwrite: bool) -> bool {
        if overwrite {
            return true;
        }
        match self.dest_mtime(dest) {
            None => true,
            Some(dest_mtime) => source_mtime > dest_mtime,
        }
    }
}

/// Create a destination's parent directories, tolerating a concurrent
/// creation race.
pub(crate) fn ensure_parent(base: &Path, dest: &str) -> Result<PathBuf> {
    let out = base.join(dest);
    if let Some(parent) = out.parent() {
        match std::fs::create_dir_all(parent) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

/// Remove a pre-existing file or link at a destination so stale content
/// and links never mix.
pub(crate) fn remove_existing(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
