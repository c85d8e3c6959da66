// src/preprocess.rs

//! Seam for the external preprocessing service.
//!
//! The macro language itself lives outside this crate; packaging only
//! needs "expand this text with these defines into that sink". The trait
//! keeps the service swappable and lets tests substitute their own
//! expansion. [`PassthroughPreprocessor`] is the built-in stand-in used
//! when no external expander is wired in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// Macro-marker convention for one preprocessed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// Directives introduced with `#`, the default.
    Hash,
    /// Directives introduced with `%`, used for stylesheet sources where
    /// `#` is meaningful content.
    Percent,
}

impl Marker {
    /// Marker convention selected by a destination path.
    pub fn for_path(path: &str) -> Self {
        if path.ends_with(".css") {
            Marker::Percent
        } else {
            Marker::Hash
        }
    }
}

/// Macro-definition set handed to the preprocessing service.
pub type Defines = BTreeMap<String, String>;

/// External text-substitution service consumed as a black box.
pub trait Preprocessor {
    /// Expand `input` with `defines` into `out`. A failure aborts the
    /// packaging run.
    fn preprocess(
        &self,
        input: &mut dyn BufRead,
        defines: &Defines,
        marker: Marker,
        out: &mut dyn Write,
    ) -> Result<()>;
}

/// Stand-in preprocessor that copies input to output verbatim, ignoring
/// defines and markers.
#[derive(Debug, Default)]
pub struct PassthroughPreprocessor;

impl Preprocessor for PassthroughPreprocessor {
    fn preprocess(
        &self,
        input: &mut dyn BufRead,
        _defines: &Defines,
        _marker: Marker,
        out: &mut dyn Write,
    ) -> Result<()> {
        std::io::copy(input, out).map_err(|e| Error::Preprocess(e.to_string()))?;
        Ok(())
    }
}
