// src/rewrite/about.rs

//! `info/about.json` fields and license files taken from wheel metadata

use super::LicenseFile;
use crate::package::info::AboutJson;
use crate::wheel::{CoreMetadata, Wheel};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static DOC_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^doc(umentation)?\b").unwrap());

static DEV_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(dev(elopment)?|repo(sitory))\b").unwrap());

/// Person headers copied into `extra`
const PERSON_HEADERS: [&str; 4] = ["Author", "Maintainer", "Author-email", "Maintainer-email"];

/// Build the about record from `METADATA`
pub fn about_from_metadata(md: &CoreMetadata) -> AboutJson {
    let mut about = AboutJson {
        summary: non_empty(md.get("Summary")),
        license: md.license().map(String::from),
        home: non_empty(md.get("Home-page")),
        classifiers: md.get_all("Classifier").map(String::from).collect(),
        keywords: md.get("Keywords").map(split_keywords).unwrap_or_default(),
        whl2conda_version: env!("CARGO_PKG_VERSION").to_string(),
        ..AboutJson::default()
    };

    let mut extra = BTreeMap::new();
    for entry in md.get_all("Project-URL") {
        let Some((label, url)) = entry.split_once(',') else {
            debug!("Skipping Project-URL without label: {}", entry);
            continue;
        };
        let (label, url) = (label.trim(), url.trim());
        if label.is_empty() || url.is_empty() {
            continue;
        }
        let lower = label.to_lowercase();
        if DOC_LABEL_RE.is_match(&lower) {
            about.doc_url = Some(url.to_string());
        } else if DEV_LABEL_RE.is_match(&lower) {
            about.dev_url = Some(url.to_string());
        } else if about.home.is_none() && matches!(lower.as_str(), "homepage" | "home") {
            about.home = Some(url.to_string());
        }
        extra.insert(label.to_string(), serde_json::Value::from(url));
    }

    for header in PERSON_HEADERS {
        if let Some(value) = non_empty(md.get(header)) {
            extra.insert(header.to_lowercase(), serde_json::Value::from(value));
        }
    }

    let license_files: Vec<&str> = md.get_all("License-File").collect();
    if !license_files.is_empty() {
        extra.insert("license_files".to_string(), serde_json::Value::from(license_files));
    }

    about.extra = extra;
    about
}

/// License files to ship under `info/licenses/`
///
/// A `<dist-info>/licenses/` directory is copied as a whole. Otherwise each
/// `License-File` value is looked up relative to the dist-info directory,
/// then by its file name alone.
pub fn collect_license_files(wheel: &Wheel) -> Vec<LicenseFile> {
    let licenses_prefix = wheel.dist_info_path("licenses/");
    let from_dir: Vec<LicenseFile> = wheel
        .files
        .iter()
        .filter_map(|f| {
            let rel = f.path.strip_prefix(&licenses_prefix)?;
            Some(LicenseFile {
                path: rel.to_string(),
                data: f.data.clone(),
            })
        })
        .collect();
    if !from_dir.is_empty() {
        return from_dir;
    }

    let mut out: Vec<LicenseFile> = Vec::new();
    for declared in wheel.metadata.get_all("License-File") {
        let declared = declared.trim().trim_start_matches('/');
        let basename = declared.rsplit('/').next().unwrap_or(declared);
        let found = [declared, basename]
            .into_iter()
            .find_map(|rel| wheel.file(&wheel.dist_info_path(rel)).map(|f| (rel, f)));
        match found {
            Some((rel, file)) if !out.iter().any(|l| l.path == rel) => out.push(LicenseFile {
                path: rel.to_string(),
                data: file.data.clone(),
            }),
            Some(_) => {}
            None => warn!("License file {} not found in {}", declared, wheel.dist_info),
        }
    }
    out
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
        .map(String::from)
}

/// `Keywords` is comma separated; older wheels use spaces
fn split_keywords(value: &str) -> Vec<String> {
    let parts: Vec<&str> = if value.contains(',') {
        value.split(',').collect()
    } else {
        value.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
