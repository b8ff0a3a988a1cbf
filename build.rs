// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: packages to operate on
fn packages_arg(help: &'static str) -> Arg {
    Arg::new("packages")
        .value_name("PACKAGE")
        .num_args(1..)
        .required(true)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("foampm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A community package manager for simulation toolkit add-ons")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v for info, -vv for debug)"),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages and their dependencies")
                .arg(packages_arg(
                    "Package name, local directory, git URL with optional @ref, or name@origin",
                ))
                .arg(
                    Arg::new("upgrade")
                        .short('U')
                        .long("upgrade")
                        .action(ArgAction::SetTrue)
                        .help("Upgrade packages whose origin has a newer revision"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Reinstall the named packages even if they are up to date"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Number of packages fetched and built concurrently"),
                )
                .arg(
                    Arg::new("index_url")
                        .long("index-url")
                        .value_name("URL")
                        .help("Package index to look names up in"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show what would be installed without making changes"),
                ),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Uninstall packages")
                .arg(packages_arg("Packages to uninstall")),
        )
        .subcommand(Command::new("freeze").about("List installed packages"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(Arg::new("shell").required(true).help("Shell to generate completions for")),
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

    let man_path = man_dir.join("foampm.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
