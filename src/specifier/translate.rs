// src/specifier/translate.rs

//! Python version clauses to conda match-spec clauses
//!
//! Conda accepts `==`, `!=`, `<`, `<=`, `>`, `>=` with the same meaning as
//! PEP 440, including `==X.*` wildcards, so those pass through untouched.
//! `~=` expands to a lower bound plus a wildcard pin, and `===` has no conda
//! equivalent and degrades to `==`.

use super::{Clause, Condition, Operator, Requirement};
use serde::Serialize;
use std::fmt;

/// Result of translating one clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseTranslation {
    pub clauses: Vec<Clause>,
    /// Set when the conda clauses do not mean exactly the same thing
    pub lossy: bool,
}

/// Something the translator could not carry over exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationWarning {
    LossyOperator { clause: String, translated: String },
    UnknownOperator { clause: String },
    EnvironmentMarker { marker: String },
    ExtrasNotExpanded { extras: Vec<String> },
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyOperator { clause, translated } => {
                write!(f, "'{}' translated approximately as '{}'", clause, translated)
            }
            Self::UnknownOperator { clause } => {
                write!(f, "unknown operator in '{}', kept verbatim", clause)
            }
            Self::EnvironmentMarker { marker } => {
                write!(f, "environment marker '{}' cannot be expressed in conda", marker)
            }
            Self::ExtrasNotExpanded { extras } => {
                write!(f, "extras [{}] not expanded", extras.join(","))
            }
        }
    }
}

/// Result of translating a whole requirement's constraints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    /// Conda clause texts, in declaration order
    pub clauses: Vec<String>,
    pub warnings: Vec<TranslationWarning>,
}

impl Translation {
    pub fn is_lossy(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether the requirement is only needed in some environments
    pub fn has_environment_marker(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, TranslationWarning::EnvironmentMarker { .. }))
    }
}

/// Translate a single python clause into one or more conda clauses
pub fn translate_clause(clause: &Clause) -> ClauseTranslation {
    match clause.operator {
        op if op.is_conda_native() => ClauseTranslation {
            clauses: vec![clause.clone()],
            lossy: false,
        },
        Operator::Compatible => match compatible_wildcard(&clause.version) {
            Some(wildcard) => ClauseTranslation {
                clauses: vec![
                    Clause::new(Operator::GreaterEqual, clause.version.clone()),
                    Clause::new(Operator::Equal, wildcard),
                ],
                lossy: false,
            },
            // `~=X` is not valid PEP 440; keep the lower bound only
            None => ClauseTranslation {
                clauses: vec![Clause::new(Operator::GreaterEqual, clause.version.clone())],
                lossy: true,
            },
        },
        _ => ClauseTranslation {
            clauses: vec![Clause::new(Operator::Equal, clause.version.clone())],
            lossy: true,
        },
    }
}

/// Translate all constraints of a requirement
///
/// Never fails: anything that cannot be expressed exactly is carried over as
/// closely as possible and recorded as a warning.
pub fn translate_requirement(req: &Requirement) -> Translation {
    let mut out = Translation::default();

    for clause in &req.clauses {
        let translated = translate_clause(clause);
        let texts: Vec<String> = translated.clauses.iter().map(Clause::to_string).collect();
        if translated.lossy {
            out.warnings.push(TranslationWarning::LossyOperator {
                clause: clause.to_string(),
                translated: texts.join(","),
            });
        }
        out.clauses.extend(texts);
    }

    for text in &req.unknown_clauses {
        out.warnings.push(TranslationWarning::UnknownOperator {
            clause: text.clone(),
        });
        out.clauses.push(text.chars().filter(|c| !c.is_whitespace()).collect());
    }

    if !req.extras.is_empty() {
        out.warnings.push(TranslationWarning::ExtrasNotExpanded {
            extras: req.extras.clone(),
        });
    }

    if let Condition::Environment(marker) = req.condition() {
        out.warnings.push(TranslationWarning::EnvironmentMarker { marker });
    }

    out
}

/// Render a conda dependency: `name` or `name c1,c2`
pub fn conda_spec(name: &str, clauses: &[String]) -> String {
    if clauses.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, clauses.join(","))
    }
}

/// The `==` wildcard that bounds `~=version` from above
///
/// Drops the last release component and any pre/post/dev/local suffix; keeps
/// the epoch. Returns `None` when the release has fewer than two components.
fn compatible_wildcard(version: &str) -> Option<String> {
    let (epoch, rest) = match version.split_once('!') {
        Some((epoch, rest)) => (Some(epoch), rest),
        None => (None, version),
    };

    let release: String = rest
        .trim_start_matches(['v', 'V'])
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let components: Vec<&str> = release.split('.').filter(|c| !c.is_empty()).collect();
    if components.len() < 2 {
        return None;
    }

    let prefix = components[..components.len() - 1].join(".");
    Some(match epoch {
        Some(epoch) => format!("{}!{}.*", epoch, prefix),
        None => format!("{}.*", prefix),
    })
}
