// src/error.rs

//! Crate-wide error and result types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A manifest line matched no recognized production.
    #[error("unrecognized manifest line: {line:?}")]
    Grammar { line: String },

    /// Incompatible options or flag combinations.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A non-wildcard source was not found in any search directory.
    #[error("source {src:?} not found in {}", format_searched(.searched))]
    SourceNotFound {
        src: String,
        searched: Vec<PathBuf>,
    },

    /// The external preprocessing service failed.
    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    /// A destination was registered twice in a strict install manifest.
    #[error("destination already in manifest: {0}")]
    DuplicateDestination(String),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
