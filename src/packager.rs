// src/packager.rs

//! The packaging run context.
//!
//! A [`Packager`] owns one run's configuration and aggregate state:
//! parse the manifest, resolve each entry's source through the right
//! search context, hand it to the selected materializer, and accumulate
//! registration directives for a single flush at the end of the run.
//! Processing is strictly sequential; the first fatal error aborts the
//! run with the container closed.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::manifest::{ManifestEntry, ManifestParser, PackageSection};
use crate::materialize::{Materializer, OutputFormat};
use crate::preprocess::{Defines, Marker, PassthroughPreprocessor, Preprocessor};
use crate::register::RegistrationManifests;
use crate::resolve::{
    expand_wildcard, is_wildcard, locale_overlay, SearchContext, DEFAULT_LOCALE,
};

/// File name of the aggregate (and root) registration manifest.
pub const REGISTER_MANIFEST: &str = "register.manifest";

/// Drives one packaging run.
pub struct Packager {
    format: OutputFormat,
    top_src_dir: PathBuf,
    source_dirs: Vec<PathBuf>,
    object_dir: PathBuf,
    locale_base: Option<PathBuf>,
    locale_merge: Option<PathBuf>,
    relative_src_dir: Option<String>,
    explicit_locale_dirs: Option<Vec<PathBuf>>,
    /// Active locale overlay; recomputed when a section overrides its
    /// relative source directory, and kept for the sections after it.
    locale_dirs: Option<Vec<PathBuf>>,
    root_app_id: Option<String>,
    use_section_manifest: bool,
    use_register_manifest: bool,
    defines: Defines,
    preprocessor: Box<dyn Preprocessor>,
    registrations: RegistrationManifests,
}

impl Packager {
    pub fn new(format: OutputFormat, top_src_dir: &Path) -> Self {
        Self {
            format,
            top_src_dir: top_src_dir.to_path_buf(),
            source_dirs: Vec::new(),
            object_dir: PathBuf::from("."),
            locale_base: None,
            locale_merge: None,
            relative_src_dir: None,
            explicit_locale_dirs: None,
            locale_dirs: None,
            root_app_id: None,
            use_section_manifest: true,
            use_register_manifest: false,
            defines: Defines::new(),
            preprocessor: Box::new(PassthroughPreprocessor),
            registrations: RegistrationManifests::new(),
        }
    }

    /// Add a directory to the relative source search path.
    pub fn with_source_dir(mut self, dir: &Path) -> Self {
        self.source_dirs.push(dir.to_path_buf());
        self
    }

    /// Set the object directory searched after the source directories
    /// (default: the current working directory).
    pub fn with_object_dir(mut self, dir: &Path) -> Self {
        self.object_dir = dir.to_path_buf();
        self
    }

    pub fn with_locale_base(mut self, dir: &Path) -> Self {
        self.locale_base = Some(dir.to_path_buf());
        self
    }

    pub fn with_locale_merge(mut self, dir: &Path) -> Self {
        self.locale_merge = Some(dir.to_path_buf());
        self
    }

    pub fn with_relative_src_dir(mut self, rel: &str) -> Self {
        self.relative_src_dir = Some(rel.to_string());
        self
    }

    /// Use explicit localization directories instead of the computed
    /// overlay.
    pub fn with_locale_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.explicit_locale_dirs = Some(dirs);
        self
    }

    /// Tag the root registration manifest with an application identifier.
    pub fn with_root_app_id(mut self, app_id: &str) -> Self {
        self.root_app_id = Some(app_id.to_string());
        self
    }

    /// Record substituted directives into the aggregate manifest instead
    /// of per-section manifest files.
    pub fn register_into_aggregate(mut self) -> Self {
        self.use_register_manifest = true;
        self.use_section_manifest = false;
        self
    }

    pub fn with_define(mut self, key: &str, value: &str) -> Self {
        self.defines.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Box<dyn Preprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Check option compatibility before a run.
    pub fn validate(&self) -> Result<()> {
        if self.locale_merge.is_some() && self.locale_base.is_none() {
            return Err(Error::Config(
                "a merge directory requires a base localization directory".to_string(),
            ));
        }
        if self.locale_base.is_some() && self.relative_src_dir.is_none() {
            return Err(Error::Config(
                "a base localization directory requires a relative source directory".to_string(),
            ));
        }
        Ok(())
    }

    /// Run include files through the preprocessor for their define side
    /// effects only; content coming out of them is unexpected.
    pub fn process_define_includes(&mut self, includes: &[PathBuf]) -> Result<()> {
        for include in includes {
            let mut reader = BufReader::new(File::open(include)?);
            let mut produced = Vec::new();
            self.preprocessor
                .preprocess(&mut reader, &self.defines, Marker::Hash, &mut produced)?;
            if !produced.is_empty() {
                warn!("include {} produced non-empty output", include.display());
            }
        }
        Ok(())
    }

    /// Package one manifest file into `out_dir`.
    ///
    /// The manifest text itself is macro-expanded before parsing, and the
    /// manifest's directory joins the source search path.
    pub fn make_package(&mut self, manifest: &Path, out_dir: &Path) -> Result<()> {
        info!("processing {}", manifest.display());
        let mut reader = BufReader::new(File::open(manifest)?);
        let mut expanded = Vec::new();
        self.preprocessor
            .preprocess(&mut reader, &self.defines, Marker::Hash, &mut expanded)?;
        let text = String::from_utf8(expanded).map_err(|e| {
            Error::Config(format!("manifest {} is not UTF-8: {e}", manifest.display()))
        })?;
        self.run(&text, manifest.parent(), out_dir)
    }

    /// Package already-expanded manifest text into `out_dir`.
    pub fn run(&mut self, text: &str, manifest_dir: Option<&Path>, out_dir: &Path) -> Result<()> {
        self.validate()?;

        let mut source_dirs = self.source_dirs.clone();
        if let Some(dir) = manifest_dir {
            source_dirs.push(dir.to_path_buf());
        }

        self.locale_dirs = match (&self.explicit_locale_dirs, &self.relative_src_dir) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(rel)) => Some(self.compute_overlay(rel)),
            (None, None) => None,
        };

        let sections = ManifestParser::parse(text)?;
        for section in &sections {
            self.process_section(section, out_dir, &source_dirs)?;
        }
        Ok(())
    }

    /// Write all accumulated registration manifests. Call once, at the
    /// end of the run.
    pub fn flush_manifests(&self) -> Result<()> {
        self.registrations.flush()
    }

    pub fn registrations(&self) -> &RegistrationManifests {
        &self.registrations
    }

    fn compute_overlay(&self, relative_src_dir: &str) -> Vec<PathBuf> {
        locale_overlay(
            &self.top_src_dir,
            relative_src_dir,
            self.locale_base.as_deref(),
            self.locale_merge.as_deref(),
            DEFAULT_LOCALE,
        )
    }

    fn process_section(
        &mut self,
        section: &PackageSection,
        out_dir: &Path,
        source_dirs: &[PathBuf],
    ) -> Result<()> {
        debug!("section {}", section.name);
        if let Some(rel) = &section.relative_src_dir {
            self.locale_dirs = Some(self.compute_overlay(rel));
        }

        let mut out = self.format.create(out_dir, &section.name)?;
        for entry in &section.entries {
            let context = match self.entry_context(entry, source_dirs) {
                Ok(context) => context,
                Err(e) => {
                    let _ = out.finish();
                    return Err(e);
                }
            };
            if let Err(e) = self.process_entry(entry, &context, out.as_mut()) {
                // Close (and unlock) the container before propagating.
                let _ = out.finish();
                return Err(e);
            }
        }

        self.finalize_section(section, out_dir);
        out.finish()
    }

    /// Search context and effective source reference for one entry.
    fn entry_context(
        &self,
        entry: &ManifestEntry,
        source_dirs: &[PathBuf],
    ) -> Result<(SearchContext, String)> {
        if entry.is_locale {
            let dirs = self.locale_dirs.clone().ok_or_else(|| {
                Error::Config(format!(
                    "locale source {:?} without localization configuration",
                    entry.source
                ))
            })?;
            return Ok((SearchContext::locale(dirs), entry.source.clone()));
        }
        if let Some(stripped) = entry.source.strip_prefix('/') {
            return Ok((
                SearchContext::absolute(&self.top_src_dir),
                stripped.to_string(),
            ));
        }
        Ok((
            SearchContext::relative(source_dirs, &self.object_dir),
            entry.source.clone(),
        ))
    }

    fn process_entry(
        &self,
        entry: &ManifestEntry,
        (context, source): &(SearchContext, String),
        out: &mut dyn Materializer,
    ) -> Result<()> {
        if is_wildcard(source) {
            if entry.preprocess {
                return Err(Error::Config(format!(
                    "wildcards are not supported with preprocessing: {:?}",
                    entry.source
                )));
            }
            for expanded in expand_wildcard(entry, source, context)? {
                let concrete = (context.clone(), expanded.source.clone());
                self.process_entry(&expanded, &concrete, out)?;
            }
            return Ok(());
        }

        let resolved = context.resolve(source)?;
        let source_mtime = fs::metadata(&resolved)?.modified()?;
        if !out.needs_refresh(&entry.output, source_mtime, entry.overwrite) {
            debug!("up to date: {}", entry.output);
            return Ok(());
        }

        if entry.preprocess {
            let marker = Marker::for_path(&entry.output);
            let mut reader = BufReader::new(File::open(&resolved)?);
            let mut content = Vec::new();
            self.preprocessor
                .preprocess(&mut reader, &self.defines, marker, &mut content)?;
            out.write(&entry.output, &content, None)?;
        } else {
            out.place(&resolved, &entry.output)?;
        }
        Ok(())
    }

    /// Record the section's registration directives, with their `%`
    /// placeholder substituted by the artifact base path.
    fn finalize_section(&mut self, section: &PackageSection, out_dir: &Path) {
        if section.directives.is_empty() {
            return;
        }

        let name = base_name(&section.name);
        let dir_base = out_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let aggregate_dir = normalize(&out_dir.join(".."));
        let aggregate = aggregate_dir.join(REGISTER_MANIFEST);

        if self.use_section_manifest {
            let section_manifest = out_dir.join(format!("{}.manifest", section.name));
            let base = self.format.register_base("", name);
            for directive in &section.directives {
                self.registrations
                    .record(&section_manifest, &directive.replace('%', &base));
            }
            self.registrations
                .record(&aggregate, &format!("manifest {dir_base}/{name}.manifest"));
        }

        if self.use_register_manifest {
            let base = self.format.register_base(&format!("{dir_base}/"), name);
            for directive in &section.directives {
                self.registrations
                    .record(&aggregate, &directive.replace('%', &base));
            }
        }

        // An application-scoped root entry lets a package tree serve one
        // application variant among several sharing the root.
        if let Some(app_id) = &self.root_app_id {
            let root = normalize(&aggregate_dir.join("..")).join(REGISTER_MANIFEST);
            let scoped_dir = aggregate_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("adding {scoped_dir:?} entry to root manifest appid={app_id}");
            self.registrations.record(
                &root,
                &format!("manifest {scoped_dir}/{REGISTER_MANIFEST} application={app_id}"),
            );
        }
    }
}

/// Final path segment of a section name.
fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("a/./b/..")), PathBuf::from("a"));
        assert_eq!(normalize(Path::new("/x/y/..")), PathBuf::from("/x"));
    }

    #[test]
    fn test_validate_merge_requires_base() {
        let packager = Packager::new(OutputFormat::Flat, Path::new("/top"))
            .with_locale_merge(Path::new("/merge"));
        assert!(matches!(packager.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_base_requires_relativesrcdir() {
        let packager = Packager::new(OutputFormat::Flat, Path::new("/top"))
            .with_locale_base(Path::new("/base"));
        assert!(matches!(packager.validate(), Err(Error::Config(_))));

        let packager = Packager::new(OutputFormat::Flat, Path::new("/top"))
            .with_locale_base(Path::new("/base"))
            .with_relative_src_dir("app/locales");
        assert!(packager.validate().is_ok());
    }

    #[test]
    fn test_wildcard_plus_preprocess_is_fatal() {
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();

        let mut packager = Packager::new(OutputFormat::Flat, tmp.path()).with_source_dir(&src);
        let err = packager
            .run("a.pkg:\n* data (files/*.js)\n", None, &tmp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_locale_entry_without_configuration_is_fatal() {
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let mut packager = Packager::new(OutputFormat::Flat, tmp.path());
        let err = packager
            .run("a.pkg:\n foo (%foo)\n", None, &tmp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
