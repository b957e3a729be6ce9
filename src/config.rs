// src/config.rs
//! Conversion options and `pyproject.toml` settings
//!
//! [`ConversionOptions`] is the fully resolved input of one conversion. The
//! CLI builds it from its flags layered over the `[tool.whl2conda]` table of
//! the project's `pyproject.toml`:
//!
//! ```toml
//! [tool.whl2conda]
//! conda-name = ""
//! wheel-dir = "dist"
//! out-dir = ""
//! conda-format = "V2"
//! dependency-rename = [["acme-(.*)", "acme.$1"]]
//! extra-dependencies = []
//! ```

use crate::error::{Error, IoContext, Result, Stage};
use crate::package::TargetFormat;
use crate::rename::{DropRule, RenameRule, looks_like_regex};
use crate::specifier::canonical_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Key names of the `[tool.whl2conda]` table
const TOOL_KEYS: [&str; 6] = [
    "conda-name",
    "wheel-dir",
    "out-dir",
    "conda-format",
    "dependency-rename",
    "extra-dependencies",
];

/// A user rename rule as written on the command line or in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRuleSpec {
    pub pattern: String,
    /// Empty replacement drops the dependency
    pub replacement: String,
    pub is_regex: bool,
}

impl RenameRuleSpec {
    /// Rule whose regex flag is inferred from the pattern text
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            is_regex: looks_like_regex(&pattern),
            pattern,
            replacement: replacement.into(),
        }
    }
}

/// Everything one conversion needs besides the wheel itself
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Explicit package name, wins over everything
    pub name_override: Option<String>,
    /// Conda name declared by the project (`conda-name`)
    pub project_name: Option<String>,
    pub rename_rules: Vec<RenameRuleSpec>,
    /// Conda dependencies appended verbatim
    pub add_dependencies: Vec<String>,
    /// Names or patterns of pip dependencies to remove
    pub drop_dependencies: Vec<String>,
    pub keep_original_dependencies: bool,
    pub python_version_override: Option<String>,
    pub target_format: TargetFormat,
    pub overwrite: bool,
    /// Output directory; defaults to the wheel's directory
    pub out_dir: Option<PathBuf>,
    pub build_number: Option<u32>,
    pub dry_run: bool,
    /// Seconds since the epoch; defaults to `SOURCE_DATE_EPOCH` or now
    pub timestamp: Option<i64>,
}

impl ConversionOptions {
    /// Compile the user rename rules
    ///
    /// Rules with an empty replacement are dropped here; see [`Self::drop_rules`].
    pub fn compiled_rename_rules(&self) -> Result<Vec<RenameRule>> {
        self.rename_rules
            .iter()
            .filter(|spec| !spec.replacement.is_empty())
            .map(|spec| RenameRule::from_user(&spec.pattern, &spec.replacement, spec.is_regex))
            .collect()
    }

    /// Explicit drops plus rename rules that map to nothing
    pub fn drop_rules(&self) -> Result<Vec<DropRule>> {
        let explicit = self
            .drop_dependencies
            .iter()
            .map(|p| DropRule::new(p, looks_like_regex(p)));
        let from_renames = self
            .rename_rules
            .iter()
            .filter(|spec| spec.replacement.is_empty())
            .map(|spec| DropRule::new(&spec.pattern, spec.is_regex));
        explicit.chain(from_renames).collect()
    }

    /// Conversion time: explicit, `SOURCE_DATE_EPOCH`, or the current time
    pub fn resolve_timestamp(&self) -> i64 {
        self.timestamp
            .or_else(|| {
                std::env::var("SOURCE_DATE_EPOCH")
                    .ok()
                    .and_then(|s| s.trim().parse::<i64>().ok())
            })
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// Fill unset options from project settings
    ///
    /// Project rename rules go after command line rules, and a project rule
    /// for a pattern already given on the command line is skipped. Extra
    /// dependencies are appended.
    pub fn apply_project(&mut self, project: &ProjectConfig) {
        if self.project_name.is_none() {
            self.project_name = project.conda_name.clone();
        }
        if self.out_dir.is_none() {
            self.out_dir = project.out_dir.clone();
        }
        let overridden: Vec<String> = self
            .rename_rules
            .iter()
            .map(|r| canonical_name(&r.pattern))
            .collect();
        self.rename_rules.extend(
            project
                .dependency_rename
                .iter()
                .filter(|r| !overridden.contains(&canonical_name(&r.pattern)))
                .cloned(),
        );
        self.add_dependencies
            .extend(project.extra_dependencies.iter().cloned());
    }
}

/// `[tool.whl2conda]` settings of a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    pub project_dir: PathBuf,
    pub toml_file: Option<PathBuf>,
    pub conda_name: Option<String>,
    /// Absolute, resolved against the project directory
    pub wheel_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub conda_format: Option<TargetFormat>,
    pub dependency_rename: Vec<RenameRuleSpec>,
    pub extra_dependencies: Vec<String>,
}

impl ProjectConfig {
    /// Read settings from a project directory or a `.toml` file
    ///
    /// Malformed values are logged and ignored; only unreadable or
    /// unparseable files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let (project_dir, toml_file) = if path.is_dir() {
            (path.to_path_buf(), path.join(PYPROJECT_FILE))
        } else {
            if path.extension().is_none_or(|e| e != "toml") {
                return Err(Error::Config(format!("'{}' lacks .toml suffix", path.display())));
            }
            (
                path.parent().map(Path::to_path_buf).unwrap_or_default(),
                path.to_path_buf(),
            )
        };

        let text = fs::read_to_string(&toml_file).at(Stage::Config, &toml_file)?;
        let mut config = Self::parse(&text, &project_dir)?;
        config.toml_file = Some(toml_file);
        Ok(config)
    }

    /// Find the nearest `pyproject.toml` at or above `start`
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PYPROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Parse file contents; relative paths resolve against `project_dir`
    pub fn parse(text: &str, project_dir: &Path) -> Result<Self> {
        let doc: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;

        let mut config = Self {
            project_dir: project_dir.to_path_buf(),
            ..Self::default()
        };

        let Some(tool) = doc
            .get("tool")
            .and_then(|t| t.get("whl2conda"))
            .and_then(toml::Value::as_table)
        else {
            return Ok(config);
        };

        for key in tool.keys().filter(|k| !TOOL_KEYS.contains(&k.as_str())) {
            warn!("Ignoring unknown pyproject key 'tool.whl2conda.{}'", key);
        }

        config.conda_name = read_string(tool, "conda-name");
        config.wheel_dir = read_string(tool, "wheel-dir").map(|d| project_dir.join(d));
        config.out_dir = read_string(tool, "out-dir").map(|d| project_dir.join(d));

        if let Some(format) = read_string(tool, "conda-format") {
            match format.parse() {
                Ok(format) => config.conda_format = Some(format),
                Err(e) => warn!("Ignoring pyproject key 'tool.whl2conda.conda-format': {}", e),
            }
        }

        for entry in read_array(tool, "dependency-rename") {
            match entry.as_array().map(Vec::as_slice) {
                Some([toml::Value::String(pattern), toml::Value::String(replacement)]) => {
                    config
                        .dependency_rename
                        .push(RenameRuleSpec::new(pattern.clone(), replacement.clone()));
                }
                _ => warn!(
                    "Ignoring value in pyproject key 'tool.whl2conda.dependency-rename': \
                     expected pair of strings but got {}",
                    entry
                ),
            }
        }

        for entry in read_array(tool, "extra-dependencies") {
            match entry.as_str() {
                Some(dep) => config.extra_dependencies.push(dep.to_string()),
                None => warn!(
                    "Ignoring value in pyproject key 'tool.whl2conda.extra-dependencies': \
                     expected string but got {}",
                    entry
                ),
            }
        }

        Ok(config)
    }
}

/// Non-empty string value, warning on other types
fn read_string(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(s) if s.is_empty() => None,
        toml::Value::String(s) => Some(s.clone()),
        other => {
            warn!(
                "Ignoring pyproject key 'tool.whl2conda.{}': value is not a string: {}",
                key, other
            );
            None
        }
    }
}

fn read_array<'a>(table: &'a toml::Table, key: &str) -> &'a [toml::Value] {
    match table.get(key) {
        None => &[],
        Some(toml::Value::Array(items)) => items,
        Some(other) => {
            warn!(
                "Ignoring pyproject key 'tool.whl2conda.{}': expected a list but got {}",
                key, other
            );
            &[]
        }
    }
}

/// Commented default `[tool.whl2conda]` section
pub fn default_tool_section() -> String {
    "\
[tool.whl2conda]
# Overrides name of conda package generated by whl2conda
# If empty, default is taken from the wheel's name
conda-name = \"\"
# The default directory for whl2conda to look for wheels.
# Specified relative to the project root.
wheel-dir = \"dist\"
# The default directory for writing conda packages
# If not specified, this will be the wheel directory.
out-dir = \"\"
# The default output conda package format.
# Valid values are:
#   \"V1\" / \".tar.bz2\": original .tar.bz2 package format
#   \"V2\" / \".conda\": new V2 .conda package format
#   \"TREE\": output package as directory tree (debug)
conda-format = \"V2\"
# An optional list of pypi/conda rename patterns
# Each entry should be a two element list of the form
#   [\"<pypi-name-pattern>\", \"<conda-name>\"]
# Where <pypi-name-pattern> may either just be the pypi package name
# or a regular expression that must match the full name,
# and where <conda-name> can refer to groups in the pattern.
# For example, to rename all `acme-<foo>` packages to `acme.<foo>`:
#   [\"acme-(.*)\", \"acme.$1\"]
dependency-rename = []
# An optional list of extra conda dependencies.
extra-dependencies = []
"
    .to_string()
}

/// Add the default section to a `pyproject.toml`, creating the file if needed
///
/// `path` may be a project directory or a `.toml` file. Existing settings are
/// never modified; returns `false` when the section was already present.
pub fn add_pyproject_defaults(path: &Path) -> Result<bool> {
    let file = if path.is_dir() {
        path.join(PYPROJECT_FILE)
    } else {
        path.to_path_buf()
    };
    if file.extension().is_none_or(|e| e != "toml") {
        return Err(Error::Config(format!(
            "cannot write to non .toml file {}",
            file.display()
        )));
    }

    let existing = if file.is_file() {
        fs::read_to_string(&file).at(Stage::Config, &file)?
    } else {
        String::new()
    };

    if !existing.is_empty() {
        let doc: toml::Table = existing
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        if let Some(tool) = doc
            .get("tool")
            .and_then(|t| t.get("whl2conda"))
            .and_then(toml::Value::as_table)
        {
            let missing: Vec<&str> = TOOL_KEYS
                .iter()
                .copied()
                .filter(|k| !tool.contains_key(*k))
                .collect();
            if !missing.is_empty() {
                warn!(
                    "{} already has [tool.whl2conda]; not adding {}",
                    file.display(),
                    missing.join(", ")
                );
            }
            return Ok(false);
        }
    }

    let mut contents = existing;
    if !contents.is_empty() {
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push('\n');
    }
    contents.push_str(&default_tool_section());
    fs::write(&file, contents).at(Stage::Config, &file)?;
    Ok(true)
}
