// src/commands/convert.rs

//! Wheel conversion command
//!
//! Inputs are wheel files or project directories. A project directory stands
//! for every wheel in its wheel directory (`--wheel-dir`, the `wheel-dir`
//! project setting, or `<project>/dist`). Wheels are converted in parallel;
//! one failure does not stop the others.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::cli::ConvertArgs;
use whl2conda::config::PYPROJECT_FILE;
use whl2conda::convert::find_wheels;
use whl2conda::{
    ConversionOptions, ConversionReport, Converter, ProjectConfig, RenameRuleSpec,
    StandardRenameTable,
};

/// Convert the wheels named by `args`
pub fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let project_root = project_root(&args)?;
    let project = match (&project_root, args.ignore_pyproject) {
        (Some(root), false) if root.join(PYPROJECT_FILE).is_file() => {
            let config = ProjectConfig::load(root)
                .with_context(|| format!("Failed to read {}", root.join(PYPROJECT_FILE).display()))?;
            debug!("Using project settings from {}", root.display());
            Some(config)
        }
        _ => None,
    };

    let wheels = collect_wheels(&args, project_root.as_deref(), project.as_ref())?;
    if wheels.is_empty() {
        bail!("No wheels to convert");
    }

    let options = build_options(&args, project.as_ref());
    let table_path = args
        .rename_table
        .clone()
        .or_else(StandardRenameTable::user_cache_path);
    let table = StandardRenameTable::load_or_default(table_path.as_deref());
    let converter = Converter::new(options, Some(table)).context("Invalid conversion options")?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .context("Failed to start worker threads")?;
    info!("Converting {} wheel(s)", wheels.len());
    let results: Vec<(PathBuf, whl2conda::Result<ConversionReport>)> = pool.install(|| {
        wheels
            .par_iter()
            .map(|wheel| (wheel.clone(), converter.convert_file(wheel)))
            .collect()
    });

    let total = results.len();
    let mut reports = Vec::with_capacity(total);
    let mut failures = 0usize;
    for (wheel, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{}: {}", wheel.display(), e);
                failures += 1;
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            report.print_summary();
        }
    }

    if failures > 0 {
        bail!("{} of {} conversion(s) failed", failures, total);
    }
    Ok(())
}

/// Project root from `--project-root`, a directory input, or the first wheel's ancestors
fn project_root(args: &ConvertArgs) -> Result<Option<PathBuf>> {
    if let Some(root) = &args.project_root {
        if !root.is_dir() {
            bail!("Project root {} is not a directory", root.display());
        }
        return Ok(Some(root.clone()));
    }

    let dirs: Vec<&PathBuf> = args.inputs.iter().filter(|p| p.is_dir()).collect();
    match dirs.as_slice() {
        [] => {}
        [dir] => return Ok(Some((*dir).clone())),
        _ => bail!("Only one project directory may be given"),
    }

    match args.inputs.first() {
        None => Ok(Some(std::env::current_dir().context("No current directory")?)),
        Some(wheel) => {
            let start = wheel
                .canonicalize()
                .with_context(|| format!("Cannot access {}", wheel.display()))?;
            Ok(start
                .parent()
                .and_then(ProjectConfig::find)
                .and_then(|toml| toml.parent().map(Path::to_path_buf)))
        }
    }
}

fn collect_wheels(
    args: &ConvertArgs,
    project_root: Option<&Path>,
    project: Option<&ProjectConfig>,
) -> Result<Vec<PathBuf>> {
    let mut wheels = Vec::new();
    let mut convert_project = args.inputs.is_empty();

    for input in &args.inputs {
        if input.is_dir() {
            convert_project = true;
        } else if input.extension().is_some_and(|e| e == "whl") {
            if !input.is_file() {
                bail!("Wheel {} does not exist", input.display());
            }
            wheels.push(input.clone());
        } else {
            bail!("Input file '{}' does not have .whl suffix", input.display());
        }
    }

    if convert_project {
        let wheel_dir = args
            .wheel_dir
            .clone()
            .or_else(|| project.and_then(|p| p.wheel_dir.clone()))
            .or_else(|| project_root.map(|root| root.join("dist")))
            .context("No project directory to find wheels in")?;
        let found = find_wheels(&wheel_dir)
            .with_context(|| format!("Cannot list wheels in {}", wheel_dir.display()))?;
        if found.is_empty() {
            bail!("No wheels found in {}", wheel_dir.display());
        }
        wheels.extend(found);
    }

    Ok(wheels)
}

fn build_options(args: &ConvertArgs, project: Option<&ProjectConfig>) -> ConversionOptions {
    let rename_rules = args
        .dependency_rename
        .chunks_exact(2)
        .map(|pair| RenameRuleSpec::new(pair[0].clone(), pair[1].clone()))
        .collect();

    let mut options = ConversionOptions {
        name_override: args.name.clone(),
        rename_rules,
        add_dependencies: args.add_dependency.clone(),
        drop_dependencies: args.drop_dependency.clone(),
        keep_original_dependencies: args.keep_pip_dependencies,
        python_version_override: args.python.clone(),
        target_format: args
            .format
            .or_else(|| project.and_then(|p| p.conda_format))
            .unwrap_or_default(),
        overwrite: args.overwrite,
        out_dir: args.out_dir.clone(),
        build_number: args.build_number,
        dry_run: args.dry_run,
        timestamp: None,
        ..ConversionOptions::default()
    };
    if let Some(project) = project {
        options.apply_project(project);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use whl2conda::TargetFormat;

    #[test]
    fn test_build_options_layers_project() {
        let args = ConvertArgs {
            dependency_rename: vec!["foo".into(), "bar".into()],
            add_dependency: vec!["extra-cli".into()],
            ..ConvertArgs::default()
        };
        let project = ProjectConfig {
            conda_name: Some("proj".into()),
            conda_format: Some(TargetFormat::Tree),
            dependency_rename: vec![RenameRuleSpec::new("baz", "qux")],
            ..ProjectConfig::default()
        };
        let options = build_options(&args, Some(&project));
        assert_eq!(options.project_name.as_deref(), Some("proj"));
        assert_eq!(options.target_format, TargetFormat::Tree);
        assert_eq!(options.rename_rules.len(), 2);
        assert_eq!(options.add_dependencies, vec!["extra-cli"]);

        let args = ConvertArgs {
            format: Some(TargetFormat::LegacyArchive),
            ..ConvertArgs::default()
        };
        assert_eq!(
            build_options(&args, Some(&project)).target_format,
            TargetFormat::LegacyArchive
        );
    }

    #[test]
    fn test_collect_wheels_from_project() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir(&dist).unwrap();
        fs::write(dist.join("demo-1.0-py3-none-any.whl"), b"").unwrap();

        let args = ConvertArgs {
            inputs: vec![temp.path().to_path_buf()],
            ..ConvertArgs::default()
        };
        let root = project_root(&args).unwrap();
        assert_eq!(root.as_deref(), Some(temp.path()));
        let wheels = collect_wheels(&args, root.as_deref(), None).unwrap();
        assert_eq!(wheels, vec![dist.join("demo-1.0-py3-none-any.whl")]);
    }

    #[test]
    fn test_rejects_non_wheel_input() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("demo.tar.gz");
        fs::write(&file, b"").unwrap();
        let args = ConvertArgs {
            inputs: vec![file],
            ..ConvertArgs::default()
        };
        assert!(collect_wheels(&args, None, None).is_err());
    }
}
