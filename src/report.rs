// src/report.rs

//! Conversion report
//!
//! Everything the converter changed, dropped or could not carry over exactly
//! is recorded here instead of being silently discarded.

use crate::hash::FileChecksums;
use crate::rename::RenameKind;
use crate::specifier::TranslationWarning;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One resolved dependency name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEntry {
    pub original: String,
    pub resolved: String,
    pub reason: RenameKind,
}

/// Why a dependency was left out of the conda dependency list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OmitReason {
    /// Only needed for an optional extra
    Extra(String),
    /// Only needed in some environments
    EnvironmentMarker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedDependency {
    pub requirement: String,
    pub reason: OmitReason,
}

/// Condition recovered locally during a conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionWarning {
    LossyOperator {
        requirement: String,
        clause: String,
        translated: String,
    },
    UnknownOperator {
        requirement: String,
        clause: String,
    },
    EnvironmentMarker {
        requirement: String,
        marker: String,
    },
    ExtrasNotExpanded {
        requirement: String,
        extras: Vec<String>,
    },
    UnparseableRequirement {
        requirement: String,
        reason: String,
    },
    /// Original pip dependencies left mandatory in METADATA
    OriginalDependenciesKept { count: usize },
}

impl ConversionWarning {
    /// Attach the requirement text to a translator warning
    pub fn from_translation(requirement: &str, warning: TranslationWarning) -> Self {
        let requirement = requirement.to_string();
        match warning {
            TranslationWarning::LossyOperator { clause, translated } => Self::LossyOperator {
                requirement,
                clause,
                translated,
            },
            TranslationWarning::UnknownOperator { clause } => {
                Self::UnknownOperator { requirement, clause }
            }
            TranslationWarning::EnvironmentMarker { marker } => {
                Self::EnvironmentMarker { requirement, marker }
            }
            TranslationWarning::ExtrasNotExpanded { extras } => {
                Self::ExtrasNotExpanded { requirement, extras }
            }
        }
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyOperator {
                requirement,
                clause,
                translated,
            } => write!(
                f,
                "{}: '{}' translated approximately as '{}'",
                requirement, clause, translated
            ),
            Self::UnknownOperator {
                requirement,
                clause,
            } => write!(f, "{}: unknown operator in '{}', kept verbatim", requirement, clause),
            Self::EnvironmentMarker {
                requirement,
                marker,
            } => write!(
                f,
                "{}: skipped, environment marker '{}' has no conda equivalent",
                requirement, marker
            ),
            Self::ExtrasNotExpanded {
                requirement,
                extras,
            } => write!(
                f,
                "{}: extras [{}] not expanded",
                requirement,
                extras.join(",")
            ),
            Self::UnparseableRequirement {
                requirement,
                reason,
            } => write!(f, "{}: cannot parse ({})", requirement, reason),
            Self::OriginalDependenciesKept { count } => write!(
                f,
                "{} pip dependencies kept mandatory in METADATA",
                count
            ),
        }
    }
}

/// Summary of one wheel conversion
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub wheel: String,
    /// Package file (or directory) name
    pub package: Option<String>,
    /// Final output location; `None` for dry runs
    pub output: Option<PathBuf>,
    pub depends: Vec<String>,
    pub renames: Vec<RenameEntry>,
    pub dropped: Vec<String>,
    pub added: Vec<String>,
    pub omitted: Vec<OmittedDependency>,
    pub warnings: Vec<ConversionWarning>,
    pub checksums: Option<FileChecksums>,
    pub dry_run: bool,
}

impl ConversionReport {
    pub fn new(wheel: impl Into<String>) -> Self {
        Self {
            wheel: wheel.into(),
            ..Self::default()
        }
    }

    pub fn add_rename(&mut self, original: &str, resolved: &str, reason: RenameKind) {
        self.renames.push(RenameEntry {
            original: original.to_string(),
            resolved: resolved.to_string(),
            reason,
        });
    }

    pub fn add_dropped(&mut self, requirement: &str) {
        self.dropped.push(requirement.to_string());
    }

    pub fn add_added(&mut self, dependency: &str) {
        self.added.push(dependency.to_string());
    }

    pub fn add_omitted(&mut self, requirement: &str, reason: OmitReason) {
        self.omitted.push(OmittedDependency {
            requirement: requirement.to_string(),
            reason,
        });
    }

    pub fn add_warning(&mut self, warning: ConversionWarning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Renames that actually changed the name
    pub fn effective_renames(&self) -> impl Iterator<Item = &RenameEntry> {
        self.renames.iter().filter(|r| r.original != r.resolved)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human readable summary, one line per item
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let target = self.package.as_deref().unwrap_or("(not written)");
        if self.dry_run {
            lines.push(format!("{} -> {} (dry run)", self.wheel, target));
        } else {
            lines.push(format!("{} -> {}", self.wheel, target));
        }

        for dep in &self.depends {
            lines.push(format!("  [DEPENDS] {}", dep));
        }
        for r in self.effective_renames() {
            lines.push(format!(
                "  [RENAME] {} -> {} ({})",
                r.original, r.resolved, r.reason
            ));
        }
        for d in &self.dropped {
            lines.push(format!("  [DROP] {}", d));
        }
        for a in &self.added {
            lines.push(format!("  [ADD] {}", a));
        }
        for o in &self.omitted {
            let why = match &o.reason {
                OmitReason::Extra(extra) => format!("extra '{}'", extra),
                OmitReason::EnvironmentMarker(marker) => format!("marker '{}'", marker),
            };
            lines.push(format!("  [OMITTED] {} ({})", o.requirement, why));
        }
        for w in &self.warnings {
            lines.push(format!("  [WARNING] {}", w));
        }
        if let Some(sums) = &self.checksums {
            lines.push(format!("  sha256: {}", sums.sha256));
            lines.push(format!("  md5:    {}", sums.md5));
            lines.push(format!("  size:   {}", sums.size));
        }
        lines
    }

    pub fn print_summary(&self) {
        for line in self.summary_lines() {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let mut report = ConversionReport::new("demo-1.0-py3-none-any.whl");
        report.package = Some("demo-1.0-py_0.conda".to_string());
        report.add_rename("torch", "pytorch", RenameKind::Standard);
        report.add_rename("numpy", "numpy", RenameKind::Identity);
        report.add_dropped("types-requests");
        report.add_omitted("pytest; extra == 'test'", OmitReason::Extra("test".to_string()));

        let lines = report.summary_lines();
        assert_eq!(lines[0], "demo-1.0-py3-none-any.whl -> demo-1.0-py_0.conda");
        assert!(lines.contains(&"  [RENAME] torch -> pytorch (standard)".to_string()));
        assert!(!lines.iter().any(|l| l.contains("numpy")));
        assert!(lines.contains(&"  [DROP] types-requests".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("  [OMITTED] pytest")));
    }

    #[test]
    fn test_json_shape() {
        let mut report = ConversionReport::new("demo.whl");
        report.add_warning(ConversionWarning::from_translation(
            "foo ===1.0",
            TranslationWarning::LossyOperator {
                clause: "===1.0".to_string(),
                translated: "==1.0".to_string(),
            },
        ));
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["warnings"][0]["kind"], "lossy_operator");
        assert_eq!(value["warnings"][0]["requirement"], "foo ===1.0");
        assert_eq!(value["dry_run"], false);
    }
}
