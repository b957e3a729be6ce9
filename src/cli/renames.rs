// src/cli/renames.rs
//! Standard rename table commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum RenamesCommands {
    /// Show the cached table, or resolve pypi names through it
    Show {
        /// Pypi names to resolve
        names: Vec<String>,

        /// List every mapping
        #[arg(short, long)]
        all: bool,

        /// Table file (default: user cache)
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Download the latest table if the cached copy has expired
    Update {
        /// Download even if the cached copy is still fresh
        #[arg(short, long)]
        force: bool,

        /// Report changes without writing the cache
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Table file (default: user cache)
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Mapping source URL
        #[arg(long, value_name = "URL", default_value = whl2conda::rename::stdrename::NAME_MAPPINGS_URL)]
        url: String,
    },
}
