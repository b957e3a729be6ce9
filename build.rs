// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: rename table file
fn table_file_arg() -> Arg {
    Arg::new("file")
        .long("file")
        .value_name("FILE")
        .help("Table file (default: user cache)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("whl2conda")
        .version(env!("CARGO_PKG_VERSION"))
        .author("whl2conda Contributors")
        .about("Convert pure python wheels into noarch conda packages")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only log warnings and errors"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("convert")
                .about("Convert wheels into conda packages")
                .arg(
                    Arg::new("inputs")
                        .value_name("WHEEL|PROJECT")
                        .num_args(0..)
                        .help("Wheel files, or a project directory whose wheel directory is converted"),
                )
                .arg(
                    Arg::new("project-root")
                        .long("project-root")
                        .value_name("DIR")
                        .help("Project root holding pyproject.toml"),
                )
                .arg(
                    Arg::new("wheel-dir")
                        .short('w')
                        .long("wheel-dir")
                        .value_name("DIR")
                        .help("Directory to look for wheels when converting a project"),
                )
                .arg(flag("ignore-pyproject", "Ignore [tool.whl2conda] settings in pyproject.toml"))
                .arg(
                    Arg::new("rename-table")
                        .long("rename-table")
                        .value_name("FILE")
                        .help("Standard rename table file (default: user cache)"),
                )
                .arg(
                    Arg::new("out-dir")
                        .long("out-dir")
                        .value_name("DIR")
                        .help("Output directory (default: the wheel's directory)"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format: V1 (.tar.bz2), V2 (.conda) or TREE"),
                )
                .arg(flag("overwrite", "Replace existing output"))
                .arg(
                    Arg::new("build-number")
                        .long("build-number")
                        .value_name("N")
                        .help("Build number (default: from the wheel, else 0)"),
                )
                .arg(flag("json", "Print the conversion report as JSON"))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Number of wheels converted in parallel"),
                )
                .arg(Arg::new("name").long("name").value_name("NAME").help("Package name"))
                .arg(
                    Arg::new("dependency-rename")
                        .short('R')
                        .long("dependency-rename")
                        .num_args(2)
                        .value_names(["PIP", "CONDA"])
                        .action(ArgAction::Append)
                        .help("Rename a pip dependency; PIP may be a regular expression"),
                )
                .arg(
                    Arg::new("add-dependency")
                        .short('A')
                        .long("add-dependency")
                        .value_name("CONDA_DEP")
                        .action(ArgAction::Append)
                        .help("Add a conda dependency"),
                )
                .arg(
                    Arg::new("drop-dependency")
                        .short('D')
                        .long("drop-dependency")
                        .value_name("PIP")
                        .action(ArgAction::Append)
                        .help("Drop a pip dependency; may be a regular expression"),
                )
                .arg(
                    Arg::new("keep-pip-dependencies")
                        .short('K')
                        .long("keep-pip-dependencies")
                        .action(ArgAction::SetTrue)
                        .help("Keep pip dependencies mandatory in the package's METADATA"),
                )
                .arg(
                    Arg::new("python")
                        .long("python")
                        .value_name("SPEC")
                        .help("Python dependency version spec"),
                )
                .arg(
                    Arg::new("dry-run")
                        .short('n')
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Run every step but the final write"),
                ),
        )
        .subcommand(
            Command::new("renames")
                .about("Standard rename table management")
                .subcommand_required(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the cached table, or resolve pypi names through it")
                        .arg(Arg::new("names").num_args(0..).help("Pypi names to resolve"))
                        .arg(
                            Arg::new("all")
                                .short('a')
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("List every mapping"),
                        )
                        .arg(table_file_arg()),
                )
                .subcommand(
                    Command::new("update")
                        .about("Download the latest table if the cached copy has expired")
                        .arg(
                            Arg::new("force")
                                .short('f')
                                .long("force")
                                .action(ArgAction::SetTrue)
                                .help("Download even if the cached copy is still fresh"),
                        )
                        .arg(
                            Arg::new("dry-run")
                                .short('n')
                                .long("dry-run")
                                .action(ArgAction::SetTrue)
                                .help("Report changes without writing the cache"),
                        )
                        .arg(table_file_arg())
                        .arg(
                            Arg::new("url")
                                .long("url")
                                .value_name("URL")
                                .help("Mapping source URL"),
                        ),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Project configuration helpers")
                .arg(
                    Arg::new("generate-pyproject")
                        .long("generate-pyproject")
                        .value_name("PATH")
                        .required(true)
                        .help("Add default [tool.whl2conda] settings to a pyproject.toml"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(Arg::new("shell").required(true).help("Target shell")),
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

    let man_path = man_dir.join("whl2conda.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
