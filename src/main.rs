// src/main.rs

use anyhow::{bail, Context, Result};
use clap::Parser;
use packmaker::{OutputFormat, Packager};
use std::io::Read;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "packmaker")]
#[command(author, version, about = "Package declaratively-described content into deployable build artifacts", long_about = None)]
struct Cli {
    /// Output shape for every section in the run
    #[arg(short = 'f', long = "format", default_value = "archive")]
    format: OutputFormat,

    /// Top source directory for absolute source references
    #[arg(short = 't', long = "top-src-dir")]
    top_src_dir: PathBuf,

    /// Source directory searched for relative references (repeatable)
    #[arg(short = 's', long = "src-dir")]
    src_dirs: Vec<PathBuf>,

    /// Directory receiving the packaged artifacts
    #[arg(short = 'j', long = "output-dir")]
    output_dir: PathBuf,

    /// Explicit localization directory (repeatable, overrides the
    /// computed overlay)
    #[arg(short = 'c', long = "locale-dir")]
    locale_dirs: Vec<PathBuf>,

    /// Base localization directory (requires --relativesrcdir)
    #[arg(long = "locale-base")]
    locale_base: Option<PathBuf>,

    /// Localization merge directory (requires --locale-base)
    #[arg(long = "locale-merge")]
    locale_merge: Option<PathBuf>,

    /// Relative source directory used for localization
    #[arg(long = "relativesrcdir")]
    relativesrcdir: Option<String>,

    /// Record directives into the aggregate manifest instead of
    /// per-section files
    #[arg(short = 'e', long = "register-manifest")]
    register_manifest: bool,

    /// Add an application-scoped entry to the root registration manifest
    #[arg(long = "root-app-id")]
    root_app_id: Option<String>,

    /// Preprocessor define, KEY or KEY=VALUE (repeatable)
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,

    /// Include file processed for defines only (repeatable)
    #[arg(short = 'I', long = "include")]
    includes: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Package manifest file (stdin when omitted)
    manifest: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if cli.locale_base.is_some() && cli.relativesrcdir.is_none() {
        bail!("--relativesrcdir is required when using --locale-base");
    }
    if cli.locale_base.is_some() && !cli.locale_dirs.is_empty() {
        bail!("--locale-dir and --locale-base are not supported together");
    }
    if cli.locale_merge.is_some() && cli.locale_base.is_none() {
        bail!("--locale-base is required when using --locale-merge");
    }
    if let Some(merge) = &cli.locale_merge {
        if !merge.is_dir() {
            warn!(
                "--locale-merge passed, but {} does not exist; \
                 ignore this if the locale is complete",
                merge.display()
            );
        }
    }

    let mut packager = Packager::new(cli.format, &cli.top_src_dir);
    for dir in &cli.src_dirs {
        packager = packager.with_source_dir(dir);
    }
    if !cli.locale_dirs.is_empty() {
        packager = packager.with_locale_dirs(cli.locale_dirs.clone());
    }
    if let Some(base) = &cli.locale_base {
        packager = packager.with_locale_base(base);
    }
    if let Some(merge) = &cli.locale_merge {
        packager = packager.with_locale_merge(merge);
    }
    if let Some(rel) = &cli.relativesrcdir {
        packager = packager.with_relative_src_dir(rel);
    }
    if let Some(app_id) = &cli.root_app_id {
        packager = packager.with_root_app_id(app_id);
    }
    if cli.register_manifest {
        packager = packager.register_into_aggregate();
    }
    for define in &cli.defines {
        let (key, value) = match define.split_once('=') {
            Some((key, value)) => (key, value),
            None => (define.as_str(), "1"),
        };
        packager = packager.with_define(key, value);
    }

    packager
        .process_define_includes(&cli.includes)
        .context("processing define includes")?;

    match &cli.manifest {
        Some(manifest) => packager
            .make_package(manifest, &cli.output_dir)
            .with_context(|| format!("packaging {}", manifest.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading manifest from stdin")?;
            packager
                .run(&text, None, &cli.output_dir)
                .context("packaging manifest from stdin")?;
        }
    }

    packager.flush_manifests().context("flushing registration manifests")?;
    Ok(())
}
