// src/commands/renames.rs

//! Standard rename table commands
//!
//! The table is refreshed from the conda-forge pypi name mapping. Downloads
//! honour `ETag`/`If-None-Match` and the server's cache lifetime, which is
//! never taken as shorter than [`DEFAULT_MIN_EXPIRATION`].

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, DATE, ETAG, EXPIRES, HeaderMap, IF_NONE_MATCH, USER_AGENT};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use whl2conda::rename::StandardRenameTable;
use whl2conda::rename::stdrename::{DEFAULT_MIN_EXPIRATION, NameMapping};

/// Timeout for the mapping download
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static MAX_AGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"max-age=(\d+)").unwrap());

fn table_path(file: Option<PathBuf>) -> Result<PathBuf> {
    file.or_else(StandardRenameTable::user_cache_path)
        .ok_or_else(|| anyhow!("No user cache directory; pass --file"))
}

/// Print table information, or resolve names through the table
pub fn cmd_renames_show(names: &[String], all: bool, file: Option<PathBuf>) -> Result<()> {
    let path = table_path(file)?;
    let table = StandardRenameTable::load_or_default(Some(&path));

    if !names.is_empty() {
        for name in names {
            match table.get(name) {
                Some(conda) => println!("{} -> {}", name, conda),
                None => println!("{} -> {} (identity)", name, name.to_lowercase()),
            }
        }
        return Ok(());
    }

    println!("Table:   {}", path.display());
    println!("Source:  {}", table.source().unwrap_or("(unknown)"));
    println!("Date:    {}", table.date().unwrap_or("(unknown)"));
    match table.expires_at(DEFAULT_MIN_EXPIRATION) {
        Some(expires) => println!("Expires: {}", expires.to_rfc2822()),
        None => println!("Expires: (expired)"),
    }
    println!("Entries: {}", table.len());

    if all {
        for (pypi, conda) in table.iter() {
            println!("  {} -> {}", pypi, conda);
        }
    }
    Ok(())
}

/// Download the mapping if the cached table has expired
pub fn cmd_renames_update(
    force: bool,
    dry_run: bool,
    file: Option<PathBuf>,
    url: &str,
) -> Result<()> {
    let path = table_path(file)?;
    let current = load_current(&path);
    let now = Utc::now();

    if !force && !current.is_expired(now, DEFAULT_MIN_EXPIRATION) {
        if let Some(expires) = current.expires_at(DEFAULT_MIN_EXPIRATION) {
            println!("Rename table is up to date until {}", expires.to_rfc2822());
        }
        return Ok(());
    }

    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;
    let mut request = client
        .get(url)
        .header(USER_AGENT, format!("whl2conda/{}", env!("CARGO_PKG_VERSION")));
    if let Some(etag) = current.etag().filter(|_| !force) {
        request = request.header(IF_NONE_MATCH, format!("\"{}\"", etag));
    }

    info!("Fetching {}", url);
    let response = request
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?;

    if response.status() == StatusCode::NOT_MODIFIED {
        println!("Rename table is unchanged at {}", url);
        return Ok(());
    }
    if !response.status().is_success() {
        bail!("HTTP {} from {}", response.status(), url);
    }

    let info = DownloadInfo::from_headers(response.headers(), now);
    debug!("Download info: {:?}", info);
    let mappings: Vec<NameMapping> = response
        .json()
        .with_context(|| format!("Failed to parse name mapping from {}", url))?;

    let table = StandardRenameTable::from_name_mappings(&mappings).with_download_info(
        url,
        Some(info.date),
        info.etag,
        Some(info.max_age),
    );

    let changes = diff_tables(&current, &table);
    for line in &changes {
        println!("{}", line);
    }
    println!(
        "{} entries, {} change(s){}",
        table.len(),
        changes.len(),
        if dry_run { " (dry run)" } else { "" }
    );

    if !dry_run {
        table
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Updated {}", path.display());
    }
    Ok(())
}

fn load_current(path: &Path) -> StandardRenameTable {
    if path.exists() {
        match StandardRenameTable::load(path) {
            Ok(table) => return table,
            Err(e) => debug!("Ignoring unreadable table: {}", e),
        }
    }
    StandardRenameTable::default()
}

/// Caching information taken from the download response
#[derive(Debug, Clone, PartialEq, Eq)]
struct DownloadInfo {
    /// RFC 2822 date of the response
    date: String,
    /// Without surrounding quotes
    etag: Option<String>,
    /// Seconds; at least [`DEFAULT_MIN_EXPIRATION`]
    max_age: u64,
}

impl DownloadInfo {
    fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let get = |name| headers.get(name).and_then(|v| v.to_str().ok());
        Self::from_values(get(DATE), get(ETAG), get(CACHE_CONTROL), get(EXPIRES), now)
    }

    fn from_values(
        date: Option<&str>,
        etag: Option<&str>,
        cache_control: Option<&str>,
        expires: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let date = date
            .map(str::trim)
            .filter(|d| DateTime::parse_from_rfc2822(d).is_ok())
            .map(String::from)
            .unwrap_or_else(|| now.to_rfc2822());
        let etag = etag
            .map(|e| e.trim().trim_start_matches("W/").trim_matches('"').to_string())
            .filter(|e| !e.is_empty());
        let max_age = max_age(cache_control, expires, &date).max(DEFAULT_MIN_EXPIRATION);
        Self {
            date,
            etag,
            max_age,
        }
    }
}

/// Cache lifetime from `Cache-Control: max-age`, else `Expires - Date`
fn max_age(cache_control: Option<&str>, expires: Option<&str>, date: &str) -> u64 {
    if let Some(caps) = cache_control.and_then(|cc| MAX_AGE_RE.captures(cc))
        && let Ok(age) = caps[1].parse()
    {
        return age;
    }
    let parse = |s: &str| DateTime::parse_from_rfc2822(s.trim()).ok();
    match (expires.and_then(parse), parse(date)) {
        (Some(expires), Some(date)) => u64::try_from((expires - date).num_seconds()).unwrap_or(0),
        _ => 0,
    }
}

/// Human readable differences between two tables
fn diff_tables(old: &StandardRenameTable, new: &StandardRenameTable) -> Vec<String> {
    let mut lines = Vec::new();
    for (pypi, conda) in new.iter() {
        match old.get(pypi) {
            None => lines.push(format!("  [ADD] {} -> {}", pypi, conda)),
            Some(prev) if prev != conda => {
                lines.push(format!("  [CHANGE] {} -> {} (was {})", pypi, conda, prev))
            }
            Some(_) => {}
        }
    }
    for (pypi, conda) in old.iter() {
        if new.get(pypi).is_none() {
            lines.push(format!("  [REMOVE] {} -> {}", pypi, conda));
        }
    }
    lines
}
