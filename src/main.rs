// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Default log level for a given number of `-v` flags
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            packages,
            upgrade,
            force,
            jobs,
            index_url,
            dry_run,
        } => {
            commands::cmd_install(commands::InstallArgs {
                packages,
                upgrade,
                force,
                jobs,
                index_url,
                dry_run,
            })
            .await
        }
        Commands::Uninstall { packages } => commands::cmd_uninstall(&packages).await,
        Commands::Freeze => commands::cmd_freeze(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "foampm", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over -v
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
