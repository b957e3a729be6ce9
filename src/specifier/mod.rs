// src/specifier/mod.rs
//! Python dependency specifiers
//!
//! Parses `Requires-Dist` entries (PEP 508) into a [`Requirement`]: name,
//! extras, version clauses, and environment marker. The raw text is kept so
//! the original declaration can be re-emitted verbatim. Translation of the
//! version clauses into conda grammar lives in [`translate`].

mod translate;

pub use translate::{
    ClauseTranslation, Translation, TranslationWarning, conda_spec, translate_clause,
    translate_requirement,
};

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors from parsing specifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("cannot parse requirement: {0:?}")]
    Syntax(String),

    #[error("unknown version operator in clause {0:?}")]
    UnknownOperator(String),

    #[error("empty version in clause {0:?}")]
    EmptyVersion(String),
}

/// Version comparison operators recognized in python requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `~=` compatible release
    Compatible,
    /// `===` arbitrary string equality
    ArbitraryEqual,
}

impl Operator {
    /// Operators in the order they must be tried when matching a prefix
    const BY_PREFIX: [Operator; 8] = [
        Operator::ArbitraryEqual,
        Operator::Equal,
        Operator::NotEqual,
        Operator::Compatible,
        Operator::LessEqual,
        Operator::GreaterEqual,
        Operator::Less,
        Operator::Greater,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Compatible => "~=",
            Self::ArbitraryEqual => "===",
        }
    }

    /// Whether conda understands this operator as written
    pub const fn is_conda_native(&self) -> bool {
        !matches!(self, Self::Compatible | Self::ArbitraryEqual)
    }

    /// Split a leading operator off a clause
    fn split_prefix(s: &str) -> Option<(Operator, &str)> {
        Self::BY_PREFIX
            .iter()
            .find_map(|op| s.strip_prefix(op.as_str()).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(operator, version)` constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub operator: Operator,
    pub version: String,
}

impl Clause {
    pub fn new(operator: Operator, version: impl Into<String>) -> Self {
        Self {
            operator,
            version: version.into(),
        }
    }

    /// Parse a single clause such as `>= 1.2` or `~=23.12`
    pub fn parse(s: &str) -> Result<Self, SpecifierError> {
        let trimmed = s.trim();
        let (operator, rest) = Operator::split_prefix(trimmed)
            .ok_or_else(|| SpecifierError::UnknownOperator(trimmed.to_string()))?;
        let version: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
        if version.is_empty() {
            return Err(SpecifierError::EmptyVersion(trimmed.to_string()));
        }
        Ok(Self { operator, version })
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// What a requirement's marker makes it conditional on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Always required
    Unconditional,
    /// Only required when the named extra is requested
    Extra(String),
    /// Depends on the target environment (python version, platform, ...)
    Environment(String),
}

/// A parsed `Requires-Dist` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub clauses: Vec<Clause>,
    /// Clause texts whose operator is not recognized, kept for reporting
    pub unknown_clauses: Vec<String>,
    /// Direct reference (`name @ url`)
    pub url: Option<String>,
    pub marker: Option<String>,
    /// Exactly as declared in the wheel
    pub raw: String,
}

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*",
        r"(?:\[(?P<extras>[^\]]*)\])?\s*",
        r"(?:@\s*(?P<url>[^;\s]+))?\s*",
        r"(?P<version>[^;]*?)\s*",
        r"(?:;\s*(?P<marker>.*?))?\s*$",
    ))
    .unwrap()
});

// `extra == 'name'` or `'name' == extra`, either quote style
static EXTRA_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"\bextra\s*==\s*(?:'(?P<a>[^']*)'|"(?P<b>[^"]*)")"#,
        r#"|(?:'(?P<c>[^']*)'|"(?P<d>[^"]*)")\s*==\s*extra\b"#,
    ))
    .unwrap()
});

impl Requirement {
    /// Parse a PEP 508 requirement string
    pub fn parse(raw: &str) -> Result<Self, SpecifierError> {
        let caps = REQUIREMENT_RE
            .captures(raw)
            .ok_or_else(|| SpecifierError::Syntax(raw.to_string()))?;

        let name = caps["name"].to_string();
        let extras = caps
            .name("extras")
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let url = caps.name("url").map(|m| m.as_str().to_string());
        let marker = caps
            .name("marker")
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty());

        let mut version = caps.name("version").map_or("", |m| m.as_str()).trim();
        if let Some(inner) = version.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
            version = inner.trim();
        }
        if url.is_some() && !version.is_empty() {
            return Err(SpecifierError::Syntax(raw.to_string()));
        }

        let mut clauses = Vec::new();
        let mut unknown_clauses = Vec::new();
        for part in version.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match Clause::parse(part) {
                Ok(clause) => clauses.push(clause),
                Err(_) => unknown_clauses.push(part.to_string()),
            }
        }

        Ok(Self {
            name,
            extras,
            clauses,
            unknown_clauses,
            url,
            marker,
            raw: raw.trim().to_string(),
        })
    }

    /// Classify the marker attached to this requirement
    pub fn condition(&self) -> Condition {
        match &self.marker {
            None => Condition::Unconditional,
            Some(marker) => match EXTRA_MARKER_RE.captures(marker) {
                Some(caps) => {
                    let extra = ["a", "b", "c", "d"]
                        .iter()
                        .find_map(|g| caps.name(g))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    Condition::Extra(extra)
                }
                None => Condition::Environment(marker.clone()),
            },
        }
    }

    /// The raw declaration without its marker
    pub fn raw_without_marker(&self) -> &str {
        split_marker(&self.raw).0
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a raw requirement at its first `;` into declaration and marker
pub fn split_marker(raw: &str) -> (&str, Option<&str>) {
    match raw.find(';') {
        Some(pos) => (raw[..pos].trim_end(), Some(raw[pos + 1..].trim())),
        None => (raw.trim_end(), None),
    }
}

/// PEP 503 canonical project name: lowercase with `-`, `_`, `.` runs folded to `-`
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}
