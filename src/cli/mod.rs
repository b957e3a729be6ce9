// src/cli/mod.rs
//! CLI definitions for whl2conda
//!
//! Command implementations live in the `commands` module.
//!
//! - `convert` - Convert wheels (or a project's built wheels) to conda packages
//! - `renames` - Inspect and refresh the standard pypi to conda rename table
//! - `config` - Write default `[tool.whl2conda]` settings
//! - `completions` - Generate shell completion scripts

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod renames;

pub use renames::RenamesCommands;

#[derive(Parser)]
#[command(name = "whl2conda")]
#[command(author = "whl2conda Contributors")]
#[command(version)]
#[command(about = "Convert pure python wheels into noarch conda packages", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert wheels into conda packages
    Convert(ConvertArgs),

    /// Standard rename table management
    #[command(subcommand)]
    Renames(RenamesCommands),

    /// Project configuration helpers
    Config {
        /// Add default [tool.whl2conda] settings to a pyproject.toml
        ///
        /// Accepts a project directory or a .toml file; `out` or `stdout`
        /// prints the settings instead.
        #[arg(long, value_name = "PATH")]
        generate_pyproject: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConvertArgs {
    /// Wheel files, or a project directory whose wheel directory is converted
    #[arg(value_name = "WHEEL|PROJECT")]
    pub inputs: Vec<PathBuf>,

    // =========================================================================
    // Input
    // =========================================================================
    /// Project root holding pyproject.toml (default: searched upward from the input)
    #[arg(long, alias = "root", value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Directory to look for wheels when converting a project
    #[arg(short, long, value_name = "DIR")]
    pub wheel_dir: Option<PathBuf>,

    /// Ignore [tool.whl2conda] settings in pyproject.toml
    #[arg(long)]
    pub ignore_pyproject: bool,

    /// Standard rename table file (default: user cache)
    #[arg(long, value_name = "FILE")]
    pub rename_table: Option<PathBuf>,

    // =========================================================================
    // Output
    // =========================================================================
    /// Output directory (default: the wheel's directory)
    #[arg(long, alias = "out", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Output format: V1 (.tar.bz2), V2 (.conda) or TREE
    #[arg(long, alias = "out-format", value_name = "FORMAT")]
    pub format: Option<whl2conda::TargetFormat>,

    /// Replace existing output
    #[arg(long)]
    pub overwrite: bool,

    /// Build number (default: from the wheel, else 0)
    #[arg(long, value_name = "N")]
    pub build_number: Option<u32>,

    /// Print the conversion report as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of wheels converted in parallel (default: number of CPUs)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    // =========================================================================
    // Overrides
    // =========================================================================
    /// Package name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Rename a pip dependency; PIP may be a regular expression
    #[arg(short = 'R', long = "dependency-rename", num_args = 2, value_names = ["PIP", "CONDA"])]
    pub dependency_rename: Vec<String>,

    /// Add a conda dependency
    #[arg(short = 'A', long = "add-dependency", value_name = "CONDA_DEP")]
    pub add_dependency: Vec<String>,

    /// Drop a pip dependency; may be a regular expression
    #[arg(short = 'D', long = "drop-dependency", value_name = "PIP")]
    pub drop_dependency: Vec<String>,

    /// Keep pip dependencies mandatory in the package's METADATA
    #[arg(short = 'K', long = "keep-pip-dependencies")]
    pub keep_pip_dependencies: bool,

    /// Python dependency version spec
    #[arg(long, value_name = "SPEC")]
    pub python: Option<String>,

    /// Run every step but the final write
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
