// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("packmaker")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Packmaker Contributors")
        .about("Package declaratively-described content into deployable build artifacts")
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["archive", "flat", "link"])
                .default_value("archive")
                .help("Output shape for every section in the run"),
        )
        .arg(
            Arg::new("top_src_dir")
                .short('t')
                .long("top-src-dir")
                .required(true)
                .help("Top source directory for absolute source references"),
        )
        .arg(
            Arg::new("src_dir")
                .short('s')
                .long("src-dir")
                .action(ArgAction::Append)
                .help("Source directory searched for relative references (repeatable)"),
        )
        .arg(
            Arg::new("output_dir")
                .short('j')
                .long("output-dir")
                .required(true)
                .help("Directory receiving the packaged artifacts"),
        )
        .arg(
            Arg::new("locale_dir")
                .short('c')
                .long("locale-dir")
                .action(ArgAction::Append)
                .help("Explicit localization directory (repeatable, overrides the computed overlay)"),
        )
        .arg(
            Arg::new("locale_base")
                .long("locale-base")
                .help("Base localization directory (requires --relativesrcdir)"),
        )
        .arg(
            Arg::new("locale_merge")
                .long("locale-merge")
                .help("Localization merge directory (requires --locale-base)"),
        )
        .arg(
            Arg::new("relativesrcdir")
                .long("relativesrcdir")
                .help("Relative source directory used for localization"),
        )
        .arg(
            Arg::new("register_manifest")
                .short('e')
                .long("register-manifest")
                .action(ArgAction::SetTrue)
                .help("Record directives into the aggregate manifest instead of per-section files"),
        )
        .arg(
            Arg::new("root_app_id")
                .long("root-app-id")
                .help("Add an application-scoped entry to the root registration manifest"),
        )
        .arg(
            Arg::new("define")
                .short('D')
                .long("define")
                .action(ArgAction::Append)
                .help("Preprocessor define, KEY or KEY=VALUE (repeatable)"),
        )
        .arg(
            Arg::new("include")
                .short('I')
                .long("include")
                .action(ArgAction::Append)
                .help("Include file processed for defines only (repeatable)"),
        )
        .arg(Arg::new("manifest").help("Package manifest file (stdin when omitted)"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("packmaker.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }
}
