// src/rename/mod.rs
//! Python to conda dependency name mapping
//!
//! A pypi project name is mapped to a conda package name by walking an
//! ordered list of [`RenameRule`] layers; the first layer that matches wins:
//!
//! 1. user exact rules (compared on the PEP 503 canonical name)
//! 2. user pattern rules, anchored full match, in declaration order
//! 3. the standard conda-forge table
//! 4. identity (lowercased)
//!
//! The resolver never touches the network or the filesystem. The standard
//! table is loaded by the caller and injected as an `Arc`.

pub mod stdrename;

pub use stdrename::StandardRenameTable;

use crate::error::{Error, Result};
use crate::specifier::canonical_name;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One layer of the name mapping
#[derive(Debug, Clone)]
pub enum RenameRule {
    /// Exact match on the canonical name
    Exact { from: String, to: String },
    /// Anchored regex with a replacement template
    Pattern(PatternRule),
    /// Standard pypi to conda table
    Table(Arc<StandardRenameTable>),
    /// Fallback: lowercased name
    Identity,
}

impl RenameRule {
    pub fn exact(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Exact {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn pattern(pattern: &str, template: &str) -> Result<Self> {
        PatternRule::new(pattern, template).map(Self::Pattern)
    }

    /// Build a user rule, inferring exact vs. pattern from the pattern text
    pub fn from_user(pattern: &str, replacement: &str, is_regex: bool) -> Result<Self> {
        if is_regex {
            Self::pattern(pattern, replacement)
        } else {
            Ok(Self::exact(pattern, replacement))
        }
    }

    fn is_user_rule(&self) -> bool {
        matches!(self, Self::Exact { .. } | Self::Pattern(_))
    }

    /// Apply this layer to `name`, returning the conda name if it matches
    fn apply(&self, name: &str, canonical: &str) -> Option<String> {
        match self {
            Self::Exact { from, to } => (canonical_name(from) == canonical).then(|| to.clone()),
            Self::Pattern(rule) => rule.apply(name),
            Self::Table(table) => table.get(canonical).map(String::from),
            Self::Identity => Some(name.to_lowercase()),
        }
    }

    fn kind(&self) -> RenameKind {
        match self {
            Self::Exact { .. } | Self::Pattern(_) => RenameKind::User,
            Self::Table(_) => RenameKind::Standard,
            Self::Identity => RenameKind::Identity,
        }
    }
}

impl fmt::Display for RenameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { from, to } => write!(f, "{} -> {}", from, to),
            Self::Pattern(rule) => write!(f, "{} -> {}", rule.source, rule.template),
            Self::Table(table) => write!(f, "standard table ({} entries)", table.len()),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Regex rename rule
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    source: String,
    template: String,
}

impl PatternRule {
    /// Compile `pattern` as a full-match regex
    ///
    /// The template accepts `$1`, `${1}`, `${name}` and the python forms
    /// `\1` and `\g<name>`.
    pub fn new(pattern: &str, template: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| Error::InvalidRule {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            regex,
            source: pattern.to_string(),
            template: normalize_template(template),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn apply(&self, name: &str) -> Option<String> {
        let caps = self.regex.captures(name)?;
        let mut out = String::new();
        caps.expand(&self.template, &mut out);
        Some(out)
    }
}

/// Rewrite a replacement template into `regex` crate syntax with braced groups
fn normalize_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(char::is_ascii_digit) => {
                out.push_str("${");
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    out.push(d);
                }
                out.push('}');
            }
            '\\' if chars.peek() == Some(&'g') => {
                chars.next();
                if chars.next_if_eq(&'<').is_some() {
                    out.push_str("${");
                    for n in chars.by_ref() {
                        if n == '>' {
                            break;
                        }
                        out.push(n);
                    }
                    out.push('}');
                } else {
                    out.push_str("\\g");
                }
            }
            '$' => match chars.peek() {
                Some('$') | Some('{') => {
                    out.push('$');
                    out.extend(chars.next());
                }
                Some(n) if n.is_ascii_digit() => {
                    out.push_str("${");
                    while let Some(d) = chars.next_if(char::is_ascii_digit) {
                        out.push(d);
                    }
                    out.push('}');
                }
                Some(n) if n.is_ascii_alphabetic() || *n == '_' => {
                    out.push_str("${");
                    while let Some(d) = chars.next_if(|n| n.is_ascii_alphanumeric() || *n == '_') {
                        out.push(d);
                    }
                    out.push('}');
                }
                _ => out.push_str("$$"),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Which layer produced a resolved name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameKind {
    User,
    Standard,
    Identity,
}

impl fmt::Display for RenameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Standard => write!(f, "standard"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Outcome of resolving one name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Conda name; empty when a user rule maps to nothing
    pub name: String,
    pub kind: RenameKind,
}

/// Ordered pypi to conda name resolver
#[derive(Debug, Clone)]
pub struct RenameResolver {
    layers: Vec<RenameRule>,
}

impl RenameResolver {
    /// Build a resolver from user rules and an optional standard table
    ///
    /// Exact rules are moved ahead of pattern rules; relative order within
    /// each group is kept. Fails with [`Error::AmbiguousRename`] when two
    /// exact rules name the same project with different targets.
    pub fn new(rules: Vec<RenameRule>, table: Option<Arc<StandardRenameTable>>) -> Result<Self> {
        let mut exact: Vec<RenameRule> = Vec::new();
        let mut patterns = Vec::new();

        for rule in rules.into_iter().filter(RenameRule::is_user_rule) {
            match rule {
                RenameRule::Exact { from, to } => {
                    let canonical = canonical_name(&from);
                    let previous = exact.iter().find_map(|prev| match prev {
                        RenameRule::Exact { from: f, to: t } if canonical_name(f) == canonical => {
                            Some(t.clone())
                        }
                        _ => None,
                    });
                    match previous {
                        Some(first) if first != to => {
                            return Err(Error::AmbiguousRename {
                                name: from,
                                first,
                                second: to,
                            });
                        }
                        Some(_) => {}
                        None => exact.push(RenameRule::Exact { from, to }),
                    }
                }
                other => patterns.push(other),
            }
        }

        let mut layers = exact;
        layers.extend(patterns);
        if let Some(table) = table {
            layers.push(RenameRule::Table(table));
        }
        layers.push(RenameRule::Identity);
        Ok(Self { layers })
    }

    /// Resolver with no user rules and no table
    pub fn identity() -> Self {
        Self {
            layers: vec![RenameRule::Identity],
        }
    }

    /// Map a pypi project name to its conda name
    pub fn resolve(&self, name: &str) -> Resolution {
        let canonical = canonical_name(name);
        for layer in &self.layers {
            if let Some(resolved) = layer.apply(name, &canonical) {
                tracing::trace!("rename {} -> {:?} via {}", name, resolved, layer);
                return Resolution {
                    name: resolved,
                    kind: layer.kind(),
                };
            }
        }
        Resolution {
            name: name.to_lowercase(),
            kind: RenameKind::Identity,
        }
    }

    /// Rules evaluated by this resolver, in order
    pub fn layers(&self) -> &[RenameRule] {
        &self.layers
    }
}

impl Default for RenameResolver {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rule that removes a dependency outright
#[derive(Debug, Clone)]
pub enum DropRule {
    Exact(String),
    Pattern(Regex),
}

impl DropRule {
    /// Exact names compare canonically; patterns must match the whole name
    pub fn new(pattern: &str, is_regex: bool) -> Result<Self> {
        if is_regex {
            Regex::new(&format!("^(?:{})$", pattern))
                .map(Self::Pattern)
                .map_err(|e| Error::InvalidRule {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        } else {
            Ok(Self::Exact(canonical_name(pattern)))
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(canonical) => canonical_name(name) == *canonical,
            Self::Pattern(regex) => regex.is_match(name),
        }
    }
}

/// Whether a rule pattern needs regex treatment
///
/// Anything outside the project-name alphabet is taken as regex syntax.
pub fn looks_like_regex(pattern: &str) -> bool {
    !pattern
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
