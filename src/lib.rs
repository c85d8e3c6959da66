// src/lib.rs

//! Packmaker
//!
//! Build-time content packager: processes declarative package manifests
//! into deployable artifacts.
//!
//! # Architecture
//!
//! - Manifest grammar: line-oriented sections mapping destinations to
//!   sources, with preprocess/overwrite/locale flags
//! - Source resolution: ordered search paths with locale overlay and
//!   wildcard expansion, first match wins
//! - Materializers: archive, flat tree, and link tree outputs behind one
//!   freshness/overwrite contract
//! - Aggregates: registration manifests and install manifests owned by
//!   the run context, flushed once per run

mod error;
pub mod install;
pub mod manifest;
pub mod materialize;
pub mod packager;
pub mod preprocess;
pub mod register;
pub mod resolve;

pub use error::{Error, Result};
pub use install::{InstallAction, InstallManifest, InstallManifestSet, OverwriteInstallManifest};
pub use manifest::{ManifestEntry, ManifestParser, PackageSection};
pub use materialize::{ArchiveOutput, FlatOutput, LinkOutput, Materializer, OutputFormat};
pub use packager::{Packager, REGISTER_MANIFEST};
pub use preprocess::{Defines, Marker, PassthroughPreprocessor, Preprocessor};
pub use register::RegistrationManifests;
pub use resolve::{locale_overlay, SearchContext, DEFAULT_LOCALE};
