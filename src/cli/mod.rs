// src/cli/mod.rs
//! CLI definitions for foampm
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "foampm")]
#[command(version)]
#[command(about = "A community package manager for simulation toolkit add-ons", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install packages and their dependencies
    ///
    /// A package is a name from the package index, a local directory, a git
    /// repository URL with an optional @ref, or name@origin.
    Install {
        /// Packages to install
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,

        /// Upgrade packages whose origin has a newer revision
        #[arg(short = 'U', long)]
        upgrade: bool,

        /// Reinstall the named packages even if they are up to date
        #[arg(short, long)]
        force: bool,

        /// Number of packages fetched and built concurrently
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Package index to look names up in
        #[arg(long, value_name = "URL")]
        index_url: Option<String>,

        /// Show what would be installed without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Uninstall packages
    Uninstall {
        /// Packages to uninstall
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,
    },

    /// List installed packages
    Freeze,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
