// src/rewrite/record.rs

//! Wheel `RECORD` maintenance
//!
//! `RECORD` is a CSV file of `path,sha256=<digest>,size`. Rewriting `METADATA`
//! invalidates its line, which is replaced here; every other line is kept.

use crate::hash;

/// Replace the `RECORD` line for `path` with the digest and size of `data`
///
/// Returns `None` when `record` has no line for `path`.
pub fn update_record(record: &str, path: &str, data: &[u8]) -> Option<String> {
    let mut found = false;
    let mut out = String::with_capacity(record.len());

    for line in record.lines() {
        if !found && first_field(line) == Some(path) {
            found = true;
            out.push_str(&format!("{},{},{}", path, hash::record_digest(data), data.len()));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }

    found.then_some(out)
}

/// First CSV field, unquoting `"..."` with doubled quotes
fn first_field(line: &str) -> Option<&str> {
    if let Some(quoted) = line.strip_prefix('"') {
        let end = quoted.find("\",")?;
        let field = &quoted[..end];
        // a doubled quote means the path itself contains quotes; never ours
        if field.contains('"') {
            return None;
        }
        Some(field)
    } else {
        line.split(',').next()
    }
}
