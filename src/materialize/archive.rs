// src/materialize/archive.rs

//! Archive materializer: entries are batched into one compressed ZIP
//! container per section.
//!
//! The container is opened in append mode so earlier runs' entries keep
//! their recorded times, and held under an exclusive lock for the
//! duration of the section so concurrent builds can target different
//! containers safely. The lock rides on the file handle and is released
//! when the container closes, on success or error alike.

use chrono::{Local, NaiveDateTime, TimeZone};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use super::Materializer;
use crate::error::{Error, Result};

/// Writes entries into a single locked container file, keyed by
/// destination path.
pub struct ArchiveOutput {
    path: PathBuf,
    writer: Option<ZipWriter<File>>,
    /// Entry times recorded in the container, pre-existing and written.
    mtimes: HashMap<String, SystemTime>,
}

impl ArchiveOutput {
    /// Open (or create) the container and take the exclusive lock.
    pub fn open(container: &Path) -> Result<Self> {
        if let Some(parent) = container.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(container)?;
        file.lock_exclusive()?;

        let mut mtimes = HashMap::new();
        let existing = file.metadata()?.len() > 0;
        if existing {
            let mut archive = ZipArchive::new(file.try_clone()?)?;
            for i in 0..archive.len() {
                let entry = archive.by_index(i)?;
                if let Some(mtime) = entry.last_modified().and_then(zip_to_system_time) {
                    mtimes.insert(entry.name().to_string(), mtime);
                }
            }
        }

        let writer = if existing {
            ZipWriter::new_append(file)?
        } else {
            ZipWriter::new(file)
        };
        debug!("opened container {}", container.display());

        Ok(Self {
            path: container.to_path_buf(),
            writer: Some(writer),
            mtimes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::Config(format!("container {} already closed", self.path.display())))
    }
}

impl Materializer for ArchiveOutput {
    fn dest_mtime(&self, dest: &str) -> Option<SystemTime> {
        self.mtimes.get(dest).copied()
    }

    fn write(&mut self, dest: &str, content: &[u8], mtime: Option<SystemTime>) -> Result<()> {
        let stamp = mtime.unwrap_or_else(SystemTime::now);
        let mut options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(dos) = system_to_zip(stamp) {
            options = options.last_modified_time(dos);
        }

        let writer = self.writer()?;
        writer.start_file(dest, options)?;
        writer.write_all(content)?;
        self.mtimes.insert(dest.to_string(), stamp);
        Ok(())
    }

    fn place(&mut self, source: &Path, dest: &str) -> Result<()> {
        let content = fs::read(source)?;
        let mtime = fs::metadata(source)?.modified()?;
        self.write(dest, &content, Some(mtime))
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            // Writes the central directory; dropping the returned file
            // handle releases the lock.
            writer.finish()?;
            debug!("closed container {}", self.path.display());
        }
        Ok(())
    }

    fn needs_refresh(&self, dest: &str, source_mtime: SystemTime, overwrite: bool) -> bool {
        if overwrite {
            return true;
        }
        let Some(dest_mtime) = self.dest_mtime(dest) else {
            return true;
        };
        // Container entry times have two-second resolution; truncate the
        // source the same way so an unchanged file never looks newer than
        // its own entry.
        let source = system_to_zip(source_mtime)
            .and_then(zip_to_system_time)
            .unwrap_or(source_mtime);
        source > dest_mtime
    }
}

fn system_to_zip(mtime: SystemTime) -> Option<DateTime> {
    let local: chrono::DateTime<Local> = mtime.into();
    DateTime::try_from(local.naive_local()).ok()
}

fn zip_to_system_time(dt: DateTime) -> Option<SystemTime> {
    let naive: NaiveDateTime = dt.try_into().ok()?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(local.into())
}
