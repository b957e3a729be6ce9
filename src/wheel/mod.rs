// src/wheel/mod.rs
//! Wheel reading and validation
//!
//! A wheel is a zip archive holding the installed layout of a python project
//! plus a `<name>-<version>.dist-info/` directory with `WHEEL`, `METADATA`,
//! `RECORD` and optionally `entry_points.txt`. Only pure python wheels
//! (`Root-Is-Purelib: true`, platform tag `any`, no compiled objects) can be
//! turned into `noarch: python` conda packages.

mod entry_points;
mod metadata;

pub use entry_points::{EntryPoints, SCRIPT_SECTIONS};
pub use metadata::{CoreMetadata, Header};

use crate::error::{Error, IoContext, Result, Stage};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// `Metadata-Version` values this reader understands
pub const SUPPORTED_METADATA_VERSIONS: &[&str] =
    &["1.0", "1.1", "1.2", "2.1", "2.2", "2.3", "2.4"];

/// Supported `Wheel-Version` major version
pub const SUPPORTED_WHEEL_MAJOR: u32 = 1;

/// Extensions of compiled extension modules
const COMPILED_EXTENSIONS: &[&str] = &[".so", ".pyd", ".dylib", ".dll"];

/// One file from the wheel archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFile {
    /// Path inside the archive, `/` separated
    pub path: String,
    pub data: Vec<u8>,
    /// Unix permission bits (0o644 or 0o755)
    pub mode: u32,
}

impl WheelFile {
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// Parsed `WHEEL` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelInfo {
    pub wheel_version: String,
    pub generator: Option<String>,
    pub root_is_purelib: bool,
    pub build: Option<String>,
    pub tags: Vec<String>,
}

impl WheelInfo {
    fn from_metadata(md: &CoreMetadata) -> Result<Self> {
        let wheel_version = md
            .get("Wheel-Version")
            .ok_or_else(|| Error::InvalidWheel("WHEEL has no Wheel-Version".to_string()))?
            .to_string();
        Ok(Self {
            wheel_version,
            generator: md.get("Generator").map(String::from),
            root_is_purelib: md
                .get("Root-Is-Purelib")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            build: md.get("Build").map(String::from),
            tags: md.get_all("Tag").map(String::from).collect(),
        })
    }
}

/// Components of a wheel file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    pub distribution: String,
    pub version: String,
    pub build: Option<String>,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
}

impl WheelFilename {
    /// Parse `{dist}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".whl")?;
        let parts: Vec<&str> = stem.split('-').collect();
        let (build, tags) = match parts.len() {
            5 => (None, &parts[2..]),
            6 => (Some(parts[2].to_string()), &parts[3..]),
            _ => return None,
        };
        Some(Self {
            distribution: parts[0].to_string(),
            version: parts[1].to_string(),
            build,
            python_tag: tags[0].to_string(),
            abi_tag: tags[1].to_string(),
            platform_tag: tags[2].to_string(),
        })
    }
}

/// An opened, validated pure python wheel
#[derive(Debug, Clone)]
pub struct Wheel {
    pub filename: String,
    /// `<name>-<version>.dist-info`
    pub dist_info: String,
    pub info: WheelInfo,
    pub metadata: CoreMetadata,
    pub entry_points: EntryPoints,
    /// Every regular file in archive order
    pub files: Vec<WheelFile>,
}

impl Wheel {
    /// Open and validate a wheel on disk
    pub fn open(path: &Path) -> Result<Self> {
        info!("Reading {}", path.display());
        let file = File::open(path).at(Stage::Unpack, path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_reader(BufReader::new(file), &filename)
    }

    /// Validate a wheel held in memory
    pub fn from_bytes(bytes: &[u8], filename: &str) -> Result<Self> {
        Self::from_reader(std::io::Cursor::new(bytes), filename)
    }

    pub fn from_reader<R: Read + Seek>(reader: R, filename: &str) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut files = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            if entry.enclosed_name().is_none() {
                return Err(Error::InvalidWheel(format!(
                    "unsafe path in archive: {}",
                    entry.name()
                )));
            }
            let path = entry.name().replace('\\', "/");
            let executable = entry.unix_mode().is_some_and(|m| m & 0o111 != 0);
            let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry.read_to_end(&mut data).at(Stage::Unpack, &path)?;
            debug!("Extracted {}", path);
            files.push(WheelFile {
                path,
                data,
                mode: if executable { 0o755 } else { 0o644 },
            });
        }

        let wheel = Self::from_files(filename, files)?;
        wheel.validate()?;
        Ok(wheel)
    }

    /// Locate and parse the dist-info records among already extracted files
    pub fn from_files(filename: &str, files: Vec<WheelFile>) -> Result<Self> {
        let mut dist_infos: Vec<&str> = files
            .iter()
            .filter_map(|f| f.path.split_once('/').map(|(top, _)| top))
            .filter(|top| top.ends_with(".dist-info"))
            .collect();
        dist_infos.sort_unstable();
        dist_infos.dedup();

        let dist_info = match dist_infos.as_slice() {
            [one] => one.to_string(),
            [] => return Err(Error::InvalidWheel("no .dist-info directory".to_string())),
            many => {
                return Err(Error::InvalidWheel(format!(
                    "multiple .dist-info directories: {}",
                    many.join(", ")
                )));
            }
        };

        let read_text = |name: &str| -> Option<String> {
            let path = format!("{}/{}", dist_info, name);
            files
                .iter()
                .find(|f| f.path == path)
                .map(|f| String::from_utf8_lossy(&f.data).into_owned())
        };

        let wheel_text = read_text("WHEEL")
            .ok_or_else(|| Error::InvalidWheel(format!("{}/WHEEL is missing", dist_info)))?;
        let metadata_text = read_text("METADATA")
            .ok_or_else(|| Error::InvalidWheel(format!("{}/METADATA is missing", dist_info)))?;

        let info = WheelInfo::from_metadata(&CoreMetadata::parse(&wheel_text))?;
        let metadata = CoreMetadata::parse(&metadata_text);
        let entry_points = read_text("entry_points.txt")
            .map(|t| EntryPoints::parse(&t))
            .unwrap_or_default();

        Ok(Self {
            filename: filename.to_string(),
            dist_info,
            info,
            metadata,
            entry_points,
            files,
        })
    }

    /// Reject wheels that cannot become a noarch python package
    pub fn validate(&self) -> Result<()> {
        let major = self
            .info
            .wheel_version
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u32>().ok());
        match major {
            Some(SUPPORTED_WHEEL_MAJOR) => {}
            _ => {
                return Err(Error::InvalidWheel(format!(
                    "unsupported Wheel-Version {}",
                    self.info.wheel_version
                )));
            }
        }
        if self.info.wheel_version.trim() != "1.0" {
            warn!(
                "Wheel-Version {} is newer than 1.0; converting anyway",
                self.info.wheel_version
            );
        }

        if !self.info.root_is_purelib {
            return Err(Error::UnsupportedContent(format!(
                "{} is not a pure python wheel (Root-Is-Purelib is not true)",
                self.display_name()
            )));
        }

        let platform_tags = self
            .info
            .tags
            .iter()
            .filter_map(|t| t.rsplit('-').next())
            .map(String::from)
            .chain(WheelFilename::parse(&self.filename).map(|f| f.platform_tag));
        for platform in platform_tags {
            if platform.split('.').any(|p| p != "any") {
                return Err(Error::UnsupportedContent(format!(
                    "{} targets platform '{}', only 'any' is supported",
                    self.display_name(),
                    platform
                )));
            }
        }

        match self.metadata.metadata_version() {
            Some(v) if SUPPORTED_METADATA_VERSIONS.contains(&v.trim()) => {}
            other => {
                return Err(Error::InvalidWheel(format!(
                    "unsupported Metadata-Version {}",
                    other.unwrap_or("(missing)")
                )));
            }
        }
        if self.metadata.name().is_none() || self.metadata.version().is_none() {
            return Err(Error::InvalidWheel(
                "METADATA must declare Name and Version".to_string(),
            ));
        }

        let data_dir = self.data_dir();
        for file in &self.files {
            if let Some(rest) = file.path.strip_prefix(&data_dir)
                && let Some(kind) = rest.strip_prefix('/').and_then(|r| r.split('/').next())
                && matches!(kind, "headers" | "data")
            {
                return Err(Error::UnsupportedContent(format!(
                    "{}: wheel .data/{} files are not supported",
                    file.path, kind
                )));
            }
            if is_compiled(file) {
                return Err(Error::UnsupportedContent(format!(
                    "{} contains compiled code: {}",
                    self.display_name(),
                    file.path
                )));
            }
        }

        Ok(())
    }

    /// `<name>-<version>.data`
    pub fn data_dir(&self) -> String {
        match self.dist_info.strip_suffix(".dist-info") {
            Some(stem) => format!("{}.data", stem),
            None => String::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name().unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.metadata.version().unwrap_or_default()
    }

    /// Build number from the `Build` tag (leading digits), else 0
    pub fn build_number(&self) -> u32 {
        self.info
            .build
            .clone()
            .or_else(|| WheelFilename::parse(&self.filename).and_then(|f| f.build))
            .and_then(|b| {
                let digits: String = b.trim().chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .unwrap_or(0)
    }

    pub fn file(&self, path: &str) -> Option<&WheelFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Path of a file inside the dist-info directory
    pub fn dist_info_path(&self, name: &str) -> String {
        format!("{}/{}", self.dist_info, name)
    }

    fn display_name(&self) -> &str {
        if self.filename.is_empty() {
            &self.dist_info
        } else {
            &self.filename
        }
    }
}

/// Whether a file is a native binary or extension module
fn is_compiled(file: &WheelFile) -> bool {
    let lower = file.path.to_ascii_lowercase();
    if COMPILED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    if file.data.len() < 4 {
        return false;
    }
    matches!(
        goblin::Object::parse(&file.data),
        Ok(goblin::Object::Elf(_) | goblin::Object::PE(_) | goblin::Object::Mach(_))
    )
}
