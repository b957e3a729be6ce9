// src/package/mod.rs
//! Conda package assembly
//!
//! Turns the files of a wheel plus a rewritten [`MetadataRecord`] into the
//! member list of a `noarch: python` conda package, then serializes it with
//! one of the [`PackageWriter`] backends.
//!
//! Package layout:
//!
//! ```text
//! info/index.json          name, version, build, depends, ...
//! info/about.json          summary, license, urls
//! info/paths.json          sha256 and size of every shipped file
//! info/files               shipped paths, one per line
//! info/link.json           noarch python marker and entry points
//! info/hash_input.json
//! info/licenses/...
//! site-packages/...        wheel purelib content, rewritten dist-info
//! python-scripts/...       wheel .data/scripts
//! ```

pub mod info;
mod legacy;
mod modern;
mod tree;
mod writer;

pub use legacy::TarBz2Writer;
pub use modern::CondaWriter;
pub use tree::TreeWriter;
pub use writer::PackageWriter;

use crate::error::{Error, IoContext, Result, Stage};
use crate::hash;
use crate::rewrite::MetadataRecord;
use crate::wheel::WheelFile;
use info::{IndexJson, LinkJson, PathEntry, PathType, PathsJson, to_json_bytes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetFormat {
    /// `.tar.bz2`
    LegacyArchive,
    /// `.conda`
    #[default]
    ModernArchive,
    /// Unpacked directory
    Tree,
}

impl TargetFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::LegacyArchive => ".tar.bz2",
            Self::ModernArchive => ".conda",
            Self::Tree => "",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::LegacyArchive => "V1",
            Self::ModernArchive => "V2",
            Self::Tree => "TREE",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | ".tar.bz2" | "tar.bz2" => Ok(Self::LegacyArchive),
            "v2" | ".conda" | "conda" => Ok(Self::ModernArchive),
            "tree" | ".tree" => Ok(Self::Tree),
            other => Err(Error::Config(format!(
                "unknown package format '{}' (expected V1, V2 or TREE)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for TargetFormat {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TargetFormat> for String {
    fn from(format: TargetFormat) -> Self {
        format.name().to_string()
    }
}

/// Noarch classification; wheels only ever produce python packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoArch {
    #[default]
    Python,
}

impl NoArch {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
        }
    }
}

/// Name, version and build of the produced package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
    pub build_number: u32,
    pub build_string: String,
    pub format: TargetFormat,
    pub noarch: NoArch,
}

impl PackageIdentity {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        build_number: u32,
        format: TargetFormat,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build_number,
            build_string: format!("py_{}", build_number),
            format,
            noarch: NoArch::Python,
        }
    }

    /// `<name>-<version>-<build>`
    pub fn stem(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build_string)
    }

    /// Output file (or directory) name
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem(), self.format.extension())
    }
}

/// One file in the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMember {
    pub path: String,
    pub data: Vec<u8>,
    pub mode: u32,
}

impl PackageMember {
    fn new(path: impl Into<String>, data: Vec<u8>, mode: u32) -> Self {
        Self {
            path: path.into(),
            data,
            mode,
        }
    }
}

/// Fully assembled package, ready to serialize
#[derive(Debug, Clone)]
pub struct PackageLayout {
    identity: PackageIdentity,
    depends: Vec<String>,
    timestamp: i64,
    info: Vec<PackageMember>,
    content: Vec<PackageMember>,
    manifest: PathsJson,
}

impl PackageLayout {
    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Conversion time in seconds since the epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn manifest(&self) -> &PathsJson {
        &self.manifest
    }

    /// `info/` members, sorted
    pub fn info_members(&self) -> &[PackageMember] {
        &self.info
    }

    /// Shipped files, sorted
    pub fn content_members(&self) -> &[PackageMember] {
        &self.content
    }

    /// Every member in write order
    pub fn members(&self) -> impl Iterator<Item = &PackageMember> {
        self.info.iter().chain(self.content.iter())
    }

    pub fn member(&self, path: &str) -> Option<&PackageMember> {
        self.members().find(|m| m.path == path)
    }

    /// Check that `paths.json` lists exactly the shipped files with matching digests
    pub fn verify_manifest(&self) -> Result<()> {
        if self.manifest.paths.len() != self.content.len() {
            return Err(Error::Manifest(format!(
                "{} files shipped but {} listed",
                self.content.len(),
                self.manifest.paths.len()
            )));
        }
        for member in &self.content {
            let entry = self
                .manifest
                .paths
                .iter()
                .find(|p| p.path == member.path)
                .ok_or_else(|| Error::Manifest(format!("{} is not listed", member.path)))?;
            if entry.size_in_bytes != member.data.len() as u64
                || entry.sha256 != hash::sha256(&member.data)
            {
                return Err(Error::Manifest(format!(
                    "digest mismatch for {}",
                    member.path
                )));
            }
        }
        Ok(())
    }

    /// Stream every member into `writer` and finalize it
    pub fn write_to(&self, writer: &mut dyn PackageWriter) -> Result<()> {
        for member in self.members() {
            writer.write_member(&member.path, &member.data, member.mode)?;
        }
        writer.finalize()
    }
}

/// Lays out conda packages from wheel content
#[derive(Debug, Clone)]
pub struct PackageAssembler {
    format: TargetFormat,
    /// Seconds since the epoch; used for index.json and archive mtimes
    timestamp: i64,
}

impl PackageAssembler {
    pub fn new(format: TargetFormat, timestamp: i64) -> Self {
        Self { format, timestamp }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Build the package members for `files` described by `record`
    pub fn assemble(&self, files: &[WheelFile], record: MetadataRecord) -> Result<PackageLayout> {
        let identity = PackageIdentity::new(
            record.name.clone(),
            record.version.clone(),
            record.build_number,
            self.format,
        );

        let metadata_path = format!("{}/METADATA", record.dist_info);
        let record_path = format!("{}/RECORD", record.dist_info);
        let data_prefix = format!("{}/", record.data_dir);

        let mut content = Vec::with_capacity(files.len());
        let mut seen = BTreeSet::new();

        for file in files {
            if is_bytecode(&file.path) {
                debug!("Skipping bytecode {}", file.path);
                continue;
            }

            let (dest, mode) = match file.path.strip_prefix(&data_prefix) {
                Some(rest) => data_destination(rest, file)?,
                None => (format!("site-packages/{}", file.path), file.mode),
            };

            let data = if file.path == metadata_path {
                record.metadata_text().into_bytes()
            } else if file.path == record_path {
                match &record.record_file {
                    Some(text) => text.clone().into_bytes(),
                    None => file.data.clone(),
                }
            } else {
                file.data.clone()
            };

            if !seen.insert(dest.clone()) {
                return Err(Error::UnsupportedContent(format!(
                    "{} is provided twice",
                    dest
                )));
            }
            debug!("Packaging {} as {}", file.path, dest);
            content.push(PackageMember::new(dest, data, mode));
        }
        content.sort_by(|a, b| a.path.cmp(&b.path));

        let manifest = PathsJson::new(
            content
                .iter()
                .map(|m| PathEntry {
                    path: m.path.clone(),
                    path_type: PathType::Hardlink,
                    sha256: hash::sha256(&m.data),
                    size_in_bytes: m.data.len() as u64,
                })
                .collect(),
        );

        let index = IndexJson {
            arch: None,
            build: identity.build_string.clone(),
            build_number: identity.build_number,
            depends: record.depends.clone(),
            license: record.license.clone(),
            name: identity.name.clone(),
            noarch: identity.noarch.as_str().to_string(),
            platform: None,
            subdir: "noarch".to_string(),
            timestamp: self.timestamp,
            version: identity.version.clone(),
        };

        let mut files_list = String::new();
        for member in &content {
            files_list.push_str(&member.path);
            files_list.push('\n');
        }

        let mut info = vec![
            PackageMember::new("info/about.json", to_json_bytes(&record.about)?, 0o644),
            PackageMember::new("info/files", files_list.into_bytes(), 0o644),
            PackageMember::new("info/hash_input.json", b"{}\n".to_vec(), 0o644),
            PackageMember::new("info/index.json", to_json_bytes(&index)?, 0o644),
            PackageMember::new(
                "info/link.json",
                to_json_bytes(&LinkJson::python(record.entry_points.clone()))?,
                0o644,
            ),
            PackageMember::new("info/paths.json", to_json_bytes(&manifest)?, 0o644),
        ];
        for license in &record.license_files {
            info.push(PackageMember::new(
                format!("info/licenses/{}", license.path),
                license.data.clone(),
                0o644,
            ));
        }
        info.sort_by(|a, b| a.path.cmp(&b.path));
        info.dedup_by(|a, b| a.path == b.path);

        let layout = PackageLayout {
            identity,
            depends: record.depends,
            timestamp: self.timestamp,
            info,
            content,
            manifest,
        };
        layout.verify_manifest()?;
        Ok(layout)
    }
}

/// Where a `<name>.data/<kind>/...` file lands in the package
fn data_destination(rest: &str, file: &WheelFile) -> Result<(String, u32)> {
    let (kind, path) = rest.split_once('/').ok_or_else(|| {
        Error::UnsupportedContent(format!("unexpected wheel data file {}", file.path))
    })?;
    match kind {
        "purelib" | "platlib" => Ok((format!("site-packages/{}", path), file.mode)),
        "scripts" => Ok((format!("python-scripts/{}", path), 0o755)),
        other => Err(Error::UnsupportedContent(format!(
            "wheel .data/{} files are not supported ({})",
            other, file.path
        ))),
    }
}

fn is_bytecode(path: &str) -> bool {
    path.ends_with(".pyc") || path.split('/').any(|c| c == "__pycache__")
}

/// Serialize `layout` to `dest` using the backend for its format
///
/// Archives are written as a single file; trees as a directory.
pub fn write_package(layout: &PackageLayout, dest: &Path) -> Result<()> {
    match layout.identity().format {
        TargetFormat::LegacyArchive => {
            let file = File::create(dest).at(Stage::Write, dest)?;
            let mut writer = TarBz2Writer::new(BufWriter::new(file), layout.timestamp());
            layout.write_to(&mut writer)
        }
        TargetFormat::ModernArchive => {
            let file = File::create(dest).at(Stage::Write, dest)?;
            let mut writer = CondaWriter::new(
                BufWriter::new(file),
                layout.identity().stem(),
                layout.timestamp(),
            );
            layout.write_to(&mut writer)
        }
        TargetFormat::Tree => {
            let mut writer = TreeWriter::new(dest)?;
            layout.write_to(&mut writer)
        }
    }
}
