// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, RenamesCommands};

/// Default log filter for the given verbosity flags
fn default_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose, cli.quiet))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Convert(args) => commands::cmd_convert(args),
        Commands::Renames(RenamesCommands::Show { names, all, file }) => {
            commands::cmd_renames_show(&names, all, file)
        }
        Commands::Renames(RenamesCommands::Update {
            force,
            dry_run,
            file,
            url,
        }) => commands::cmd_renames_update(force, dry_run, file, &url),
        Commands::Config { generate_pyproject } => {
            commands::cmd_config_generate(&generate_pyproject)
        }
        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
