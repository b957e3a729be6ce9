// src/package/info.rs

//! Records written under `info/` in a conda package

use serde::Serialize;
use std::collections::BTreeMap;

/// `info/index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexJson {
    pub arch: Option<String>,
    pub build: String,
    pub build_number: u32,
    pub depends: Vec<String>,
    pub license: Option<String>,
    pub name: String,
    pub noarch: String,
    pub platform: Option<String>,
    pub subdir: String,
    /// Seconds since the epoch, UTC
    pub timestamp: i64,
    pub version: String,
}

/// `info/about.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AboutJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classifiers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub whl2conda_version: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One entry of `info/paths.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEntry {
    #[serde(rename = "_path")]
    pub path: String,
    pub path_type: PathType,
    pub sha256: String,
    pub size_in_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    Hardlink,
}

/// `info/paths.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathsJson {
    pub paths: Vec<PathEntry>,
    pub paths_version: u32,
}

impl PathsJson {
    pub fn new(paths: Vec<PathEntry>) -> Self {
        Self {
            paths,
            paths_version: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoArchLink {
    #[serde(rename = "type")]
    pub kind: String,
}

/// `info/link.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkJson {
    pub noarch: NoArchLink,
    pub entry_points: Vec<String>,
    pub package_metadata_version: u32,
}

impl LinkJson {
    pub fn python(entry_points: Vec<String>) -> Self {
        Self {
            noarch: NoArchLink {
                kind: "python".to_string(),
            },
            entry_points,
            package_metadata_version: 1,
        }
    }
}

/// Pretty JSON with a trailing newline
pub fn to_json_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    Ok(out)
}
