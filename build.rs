// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: suite name
fn suite_arg() -> Arg {
    Arg::new("suite").required(true).help("Suite name")
}

fn build_cli() -> Command {
    Command::new("srcmirror")
        .version(env!("CARGO_PKG_VERSION"))
        .author("srcmirror Contributors")
        .about("Keep an extracted source package mirror in sync with an archive")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (default: /etc/srcmirror/config.toml, then ./config.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v for debug, -vv for trace)"),
        )
        .subcommand(
            Command::new("init").about("Create the metadata database and apply schema migrations"),
        )
        .subcommand(
            Command::new("update")
                .about("Bring extracted sources, metadata and statistics up to date")
                .arg(
                    Arg::new("stage")
                        .long("stage")
                        .value_name("STAGE")
                        .action(ArgAction::Append)
                        .help("Only run this stage: extract, suites, gc, stats, cache, charts"),
                )
                .arg(
                    Arg::new("backend")
                        .short('b')
                        .long("backend")
                        .value_name("BACKEND")
                        .action(ArgAction::Append)
                        .help("Only write to this backend: fs, db, hooks, or none"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show what would be done without writing anything"),
                )
                .arg(
                    Arg::new("force_trigger")
                        .long("force-trigger")
                        .value_name("EVENT/TITLE")
                        .action(ArgAction::Append)
                        .help("Re-run an observer on every package"),
                )
                .arg(
                    Arg::new("single_transaction")
                        .long("single-transaction")
                        .value_name("yes|no")
                        .help("One transaction per stage (yes) or per package (no)"),
                ),
        )
        .subcommand(
            Command::new("archive")
                .about("Sticky suites from the archive mirror")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("List suites on the archive mirror and sticky suites in the database"),
                )
                .subcommand(
                    Command::new("add")
                        .about("Add a suite from the archive mirror as a sticky suite")
                        .arg(suite_arg()),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove a sticky suite and the packages only it references")
                        .arg(suite_arg()),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

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

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = manifest_dir.join("man").join("srcmirror.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
