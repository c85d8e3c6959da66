// src/manifest/mod.rs

//! Package manifest data model and grammar parser.
//!
//! A package manifest is a line-oriented description of one or more named
//! package sections, each mapping destination paths inside the package to
//! source files, plus registration directives emitted alongside the
//! packaged content.

mod parser;

pub use parser::ManifestParser;

/// One destination/source mapping inside a package section.
///
/// Immutable once constructed; wildcard sources are expanded into many
/// concrete entries before materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Destination path within the section's namespace.
    pub output: String,
    /// Source reference; defaults to the destination's base name.
    pub source: String,
    /// Resolve the source through the locale overlay.
    pub is_locale: bool,
    /// Run the source through the preprocessor instead of copying bytes.
    pub preprocess: bool,
    /// Refresh the destination regardless of timestamps.
    pub overwrite: bool,
}

impl ManifestEntry {
    /// Entry copy with a different destination and source, keeping flags.
    /// Used by wildcard expansion.
    pub fn with_paths(&self, output: String, source: String) -> Self {
        Self {
            output,
            source,
            is_locale: self.is_locale,
            preprocess: self.preprocess,
            overwrite: self.overwrite,
        }
    }
}

/// One named group of entries destined for one container or subtree.
///
/// A manifest file may contain several sections with the same name: a
/// `relativesrcdir` override after content has accumulated starts a new
/// section rather than mutating the one in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSection {
    /// Logical container identifier.
    pub name: String,
    /// Relative source directory override for locale resolution.
    pub relative_src_dir: Option<String>,
    /// Registration directives, deduplicated, insertion order preserved.
    pub directives: Vec<String>,
    /// Entries in declaration order.
    pub entries: Vec<ManifestEntry>,
}

impl PackageSection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// True once directives or entries have accumulated, fixing the
    /// section's metadata.
    pub fn has_content(&self) -> bool {
        !self.directives.is_empty() || !self.entries.is_empty()
    }
}
