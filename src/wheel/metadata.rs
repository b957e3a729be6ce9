// src/wheel/metadata.rs

//! RFC 822 style header documents (`METADATA`, `WHEEL`)
//!
//! Headers keep their original text so that untouched entries are written
//! back byte for byte when the document is re-serialized.

use std::fmt;

/// One header, possibly folded across several lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    /// Unfolded value; continuation lines joined with `\n`
    pub value: String,
    /// Original text including the trailing newline, if parsed from a document
    raw: Option<String>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            raw: None,
        }
    }

    fn is(&self, name: &str) -> bool {
        !self.name.is_empty() && self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => f.write_str(raw),
            None => {
                let mut lines = self.value.lines();
                writeln!(f, "{}: {}", self.name, lines.next().unwrap_or(""))?;
                for line in lines {
                    writeln!(f, "        {}", line)?;
                }
                Ok(())
            }
        }
    }
}

/// Parsed `METADATA` or `WHEEL` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreMetadata {
    headers: Vec<Header>,
    /// Text after the first blank line (long description)
    body: Option<String>,
}

impl CoreMetadata {
    /// Parse a header document
    ///
    /// Lines that are neither `Name: value` nor continuations are kept as
    /// unnamed entries and written back unchanged.
    pub fn parse(text: &str) -> Self {
        let mut headers: Vec<Header> = Vec::new();
        let mut body = None;
        let mut rest = text;

        while !rest.is_empty() {
            let (line, next) = match rest.find('\n') {
                Some(pos) => (&rest[..=pos], &rest[pos + 1..]),
                None => (rest, ""),
            };
            let content = line.trim_end_matches(['\r', '\n']);

            if content.is_empty() {
                if !next.is_empty() {
                    body = Some(next.to_string());
                }
                break;
            }

            if content.starts_with([' ', '\t']) {
                if let Some(last) = headers.last_mut() {
                    last.value.push('\n');
                    last.value.push_str(content.trim());
                    if let Some(raw) = last.raw.as_mut() {
                        raw.push_str(line);
                    }
                }
            } else if let Some((name, value)) = content.split_once(':') {
                let mut raw = line.to_string();
                if !raw.ends_with('\n') {
                    raw.push('\n');
                }
                headers.push(Header {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                    raw: Some(raw),
                });
            } else {
                tracing::debug!("Keeping malformed metadata line verbatim: {:?}", content);
                let mut raw = line.to_string();
                if !raw.ends_with('\n') {
                    raw.push('\n');
                }
                headers.push(Header {
                    name: String::new(),
                    value: content.to_string(),
                    raw: Some(raw),
                });
            }

            rest = next;
        }

        Self { headers, body }
    }

    /// First value of a header, case-insensitive
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// All values of a repeatable header, in document order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.is(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// Remove every header with this name
    pub fn remove_all(&mut self, name: &str) {
        self.headers.retain(|h| !h.is(name));
    }

    /// Append a header after the existing ones
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    /// Named headers, skipping malformed passthrough lines
    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter().filter(|h| !h.name.is_empty())
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn metadata_version(&self) -> Option<&str> {
        self.get("Metadata-Version")
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Name")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version")
    }

    /// Dependency entries: `Requires-Dist`, or legacy `Requires` when absent
    pub fn requires_dist(&self) -> Vec<&str> {
        let dist: Vec<&str> = self.get_all("Requires-Dist").collect();
        if dist.is_empty() {
            self.get_all("Requires").collect()
        } else {
            dist
        }
    }

    /// `License-Expression` or the free-form `License`
    pub fn license(&self) -> Option<&str> {
        self.get("License-Expression")
            .or_else(|| self.get("License"))
            .filter(|l| !l.trim().is_empty())
    }
}

impl fmt::Display for CoreMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            write!(f, "{}", header)?;
        }
        if let Some(body) = &self.body {
            writeln!(f)?;
            f.write_str(body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Metadata-Version: 2.1
Name: Demo-Pkg
Version: 1.0
License: MIT
        with extra text
Requires-Dist: requests (>=2.0)
Requires-Dist: pytest ; extra == 'test'
Provides-Extra: test

# Demo

Long description.
";

    #[test]
    fn test_parse_headers() {
        let md = CoreMetadata::parse(SAMPLE);
        assert_eq!(md.metadata_version(), Some("2.1"));
        assert_eq!(md.name(), Some("Demo-Pkg"));
        assert_eq!(md.get("license"), Some("MIT\nwith extra text"));
        assert_eq!(
            md.requires_dist(),
            vec!["requests (>=2.0)", "pytest ; extra == 'test'"]
        );
        assert_eq!(md.body(), Some("# Demo\n\nLong description.\n"));
    }

    #[test]
    fn test_roundtrip_is_verbatim() {
        let md = CoreMetadata::parse(SAMPLE);
        assert_eq!(md.to_string(), SAMPLE);
    }

    #[test]
    fn test_edit_headers() {
        let mut md = CoreMetadata::parse(SAMPLE);
        md.remove_all("requires-dist");
        md.push("Requires-Dist", "requests (>=2.0); extra == \"original\"");
        md.push("Provides-Extra", "original");

        let text = md.to_string();
        assert!(!text.contains("Requires-Dist: pytest"));
        assert!(text.contains("Requires-Dist: requests (>=2.0); extra == \"original\"\n"));
        assert!(text.ends_with("Provides-Extra: original\n\n# Demo\n\nLong description.\n"));
        assert_eq!(md.get_all("Provides-Extra").count(), 2);
    }

    #[test]
    fn test_malformed_line_kept() {
        let text = "Metadata-Version: 2.1\nName: x\nnot a header line\nRequires-Dist: foo\n\nBody\n";
        let mut md = CoreMetadata::parse(text);
        assert_eq!(md.to_string(), text);
        assert_eq!(md.headers().count(), 3);
        assert_eq!(md.get("not a header line"), None);

        md.remove_all("Requires-Dist");
        md.push("Requires-Dist", "foo; extra == \"original\"");
        assert!(md.to_string().contains("Name: x\nnot a header line\n"));
    }

    #[test]
    fn test_legacy_requires() {
        let md = CoreMetadata::parse("Metadata-Version: 1.1\nName: x\nRequires: foo\n");
        assert_eq!(md.requires_dist(), vec!["foo"]);
    }

    #[test]
    fn test_crlf_and_missing_newline() {
        let md = CoreMetadata::parse("Name: x\r\nVersion: 2");
        assert_eq!(md.name(), Some("x"));
        assert_eq!(md.version(), Some("2"));
        assert!(md.body().is_none());
    }
}
