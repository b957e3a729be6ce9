// src/rename/stdrename.rs

//! Standard pypi to conda rename table
//!
//! conda-forge publishes which pypi projects are packaged under a different
//! conda name. A snapshot of that mapping lives in the user cache directory as
//! a flat JSON object:
//!
//! ```json
//! {
//!   "$source": "https://...",
//!   "$date": "Mon, 05 Oct 2026 12:00:00 GMT",
//!   "$etag": "abc123",
//!   "$max-age": "300",
//!   "torch": "pytorch"
//! }
//! ```
//!
//! Keys beginning with `$` describe the download; every other key maps a pypi
//! name to a conda name. A copy is bundled with the crate and seeded into the
//! cache on first use. Refreshing from the network is left to the caller.

use crate::error::{IoContext, Result, Stage};
use crate::specifier::canonical_name;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where conda-forge publishes its pypi name mappings
pub const NAME_MAPPINGS_URL: &str =
    "https://raw.githubusercontent.com/regro/cf-graph-countyfair/master/mappings/pypi/name_mapping.json";

/// Cached tables are never considered stale sooner than this (seconds)
pub const DEFAULT_MIN_EXPIRATION: u64 = 300;

const CACHE_FILE_NAME: &str = "stdrename.json";
const BUNDLED_TABLE: &str = include_str!("../../data/stdrename.json");

/// One entry of the published `name_mapping.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameMapping {
    #[serde(default)]
    pub pypi_name: Option<String>,
    #[serde(default)]
    pub conda_name: Option<String>,
    #[serde(default)]
    pub import_name: Option<String>,
}

/// Read-only pypi to conda name table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardRenameTable {
    /// Canonical pypi name to conda name
    mappings: BTreeMap<String, String>,
    source: Option<String>,
    date: Option<String>,
    etag: Option<String>,
    max_age: Option<u64>,
}

impl StandardRenameTable {
    /// Build a table from `(pypi, conda)` pairs
    pub fn from_mappings(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            mappings: pairs
                .into_iter()
                .map(|(pypi, conda)| (canonical_name(&pypi), conda))
                .collect(),
            ..Self::default()
        }
    }

    /// Build a table from the published mapping list
    ///
    /// Only entries whose conda name differs from the pypi name are kept.
    pub fn from_name_mappings(entries: &[NameMapping]) -> Self {
        Self::from_mappings(entries.iter().filter_map(|entry| {
            match (entry.pypi_name.as_deref(), entry.conda_name.as_deref()) {
                (Some(pypi), Some(conda)) if !pypi.is_empty() && !conda.is_empty() && pypi != conda => {
                    Some((pypi.to_string(), conda.to_string()))
                }
                _ => None,
            }
        }))
    }

    /// Attach download information
    pub fn with_download_info(
        mut self,
        source: impl Into<String>,
        date: Option<String>,
        etag: Option<String>,
        max_age: Option<u64>,
    ) -> Self {
        self.source = Some(source.into());
        self.date = date;
        self.etag = etag.filter(|e| !e.is_empty());
        self.max_age = max_age;
        self
    }

    /// Parse the cache file format
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut table = Self::default();

        for (key, value) in raw {
            match key.as_str() {
                "$source" => table.source = value.as_str().map(String::from),
                "$date" => table.date = value.as_str().map(String::from),
                "$etag" => table.etag = value.as_str().filter(|e| !e.is_empty()).map(String::from),
                "$max-age" => {
                    table.max_age = match &value {
                        serde_json::Value::Number(n) => n.as_u64(),
                        serde_json::Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    }
                }
                k if k.starts_with('$') => debug!("Ignoring rename table key {}", k),
                _ => match value.as_str() {
                    Some(conda) => {
                        table.mappings.insert(canonical_name(&key), conda.to_string());
                    }
                    None => warn!("Ignoring non-string rename table entry for {}", key),
                },
            }
        }

        Ok(table)
    }

    /// Serialize to the cache file format, keys sorted
    pub fn to_json(&self) -> Result<String> {
        let mut out: BTreeMap<&str, String> = BTreeMap::new();
        if let Some(source) = &self.source {
            out.insert("$source", source.clone());
        }
        if let Some(date) = &self.date {
            out.insert("$date", date.clone());
        }
        out.insert("$etag", self.etag.clone().unwrap_or_default());
        if let Some(max_age) = self.max_age {
            out.insert("$max-age", max_age.to_string());
        }
        for (pypi, conda) in &self.mappings {
            out.insert(pypi, conda.clone());
        }
        Ok(serde_json::to_string_pretty(&out)?)
    }

    /// The table shipped with this crate
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_TABLE).unwrap_or_else(|e| {
            warn!("Bundled rename table is unreadable: {}", e);
            Self::default()
        })
    }

    /// Load a table from a cache file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(Stage::RenameTable, path)?;
        let table = Self::from_json(&text)?;
        debug!(
            "Loaded {} standard renames from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load the cached table, seeding the cache from the bundled copy
    ///
    /// Any failure falls back to an empty table, which leaves every name to
    /// the identity rule.
    pub fn load_or_default(path: Option<&Path>) -> Arc<Self> {
        let Some(path) = path else {
            warn!("No cache directory for the standard rename table; using identity renames");
            return Arc::new(Self::default());
        };

        if let Err(e) = Self::ensure_cache(path) {
            warn!("{}", e);
        }

        match Self::load(path) {
            Ok(table) => Arc::new(table),
            Err(e) => {
                warn!("Cannot read standard rename table, using identity renames: {}", e);
                Arc::new(Self::default())
            }
        }
    }

    /// Copy the bundled table to `path` if nothing is there yet
    pub fn ensure_cache(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(Stage::RenameTable, parent)?;
        }
        fs::write(path, BUNDLED_TABLE).at(Stage::RenameTable, path)?;
        debug!("Seeded standard rename table at {}", path.display());
        Ok(())
    }

    /// Write the table to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(Stage::RenameTable, parent)?;
        }
        let json = self.to_json()?;
        fs::write(path, json).at(Stage::RenameTable, path)
    }

    /// Default cache location: `<user cache dir>/whl2conda/stdrename.json`
    pub fn user_cache_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("whl2conda").join(CACHE_FILE_NAME))
    }

    /// Conda name for a pypi name, if the table renames it
    pub fn get(&self, name: &str) -> Option<&str> {
        self.mappings.get(&canonical_name(name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mappings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    /// When this snapshot should be refreshed
    pub fn expires_at(&self, min_expiration: u64) -> Option<DateTime<Utc>> {
        let date = DateTime::parse_from_rfc2822(self.date.as_deref()?.trim()).ok()?;
        let age = self.max_age.unwrap_or(0).max(min_expiration);
        let age = Duration::try_seconds(i64::try_from(age).ok()?)?;
        Some(date.with_timezone(&Utc) + age)
    }

    /// Whether the snapshot is stale at `now`; undated tables always are
    pub fn is_expired(&self, now: DateTime<Utc>, min_expiration: u64) -> bool {
        self.expires_at(min_expiration)
            .is_none_or(|expires| expires <= now)
    }
}
