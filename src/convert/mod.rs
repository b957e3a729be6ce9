// src/convert/mod.rs
//! Conversion orchestration
//!
//! A conversion moves through a fixed sequence of states:
//!
//! ```text
//! Unpacked -> MetadataResolved -> Rewritten -> Assembled -> Written
//! ```
//!
//! Any failure aborts the run. Output is produced in a temporary sibling of
//! the destination and renamed into place only once fully written, so a
//! failed conversion never leaves anything at the final path.

use crate::config::ConversionOptions;
use crate::error::{Error, IoContext, Result, Stage};
use crate::hash;
use crate::package::{PackageAssembler, PackageLayout, TargetFormat, write_package};
use crate::rename::StandardRenameTable;
use crate::report::ConversionReport;
use crate::rewrite::Rewriter;
use crate::wheel::Wheel;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Progress of a single conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionState {
    Unpacked,
    MetadataResolved,
    Rewritten,
    Assembled,
    Written,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpacked => write!(f, "unpacked"),
            Self::MetadataResolved => write!(f, "metadata-resolved"),
            Self::Rewritten => write!(f, "rewritten"),
            Self::Assembled => write!(f, "assembled"),
            Self::Written => write!(f, "written"),
        }
    }
}

/// Converts wheels with one set of options
///
/// Cheap to share between threads: the rename table is behind an `Arc` and
/// every conversion writes to its own temporary path.
#[derive(Debug, Clone)]
pub struct Converter {
    options: ConversionOptions,
    rewriter: Rewriter,
    assembler: PackageAssembler,
}

impl Converter {
    /// Compile rules and fix the conversion timestamp
    pub fn new(
        options: ConversionOptions,
        table: Option<Arc<StandardRenameTable>>,
    ) -> Result<Self> {
        let rewriter = Rewriter::new(&options, table)?;
        let assembler = PackageAssembler::new(options.target_format, options.resolve_timestamp());
        Ok(Self {
            options,
            rewriter,
            assembler,
        })
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Convert a wheel on disk
    ///
    /// Output goes to `out_dir`, or next to the wheel.
    pub fn convert_file(&self, path: &Path) -> Result<ConversionReport> {
        let wheel = Wheel::open(path)?;
        let out_dir = match &self.options.out_dir {
            Some(dir) => dir.clone(),
            None => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        self.convert_wheel(wheel, &out_dir)
    }

    /// Convert a wheel held in memory
    ///
    /// Output goes to `out_dir`, or the current directory.
    pub fn convert_bytes(&self, bytes: &[u8], filename: &str) -> Result<ConversionReport> {
        let wheel = Wheel::from_bytes(bytes, filename)?;
        let out_dir = self
            .options
            .out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        self.convert_wheel(wheel, &out_dir)
    }

    /// Run every stage up to and including assembly
    pub fn prepare(&self, wheel: &Wheel) -> Result<(PackageLayout, ConversionReport)> {
        debug!("{}: {}", wheel.filename, ConversionState::Unpacked);

        let name = self.rewriter.package_name(wheel);
        debug!(
            "{}: {} ({} {})",
            wheel.filename,
            ConversionState::MetadataResolved,
            name,
            wheel.version()
        );

        let outcome = self.rewriter.rewrite(wheel)?;
        debug!("{}: {}", wheel.filename, ConversionState::Rewritten);

        let layout = self.assembler.assemble(&wheel.files, outcome.record)?;
        debug!(
            "{}: {} ({} members)",
            wheel.filename,
            ConversionState::Assembled,
            layout.members().count()
        );

        let mut report = outcome.report;
        report.package = Some(layout.identity().file_name());
        Ok((layout, report))
    }

    fn convert_wheel(&self, wheel: Wheel, out_dir: &Path) -> Result<ConversionReport> {
        let (layout, mut report) = self.prepare(&wheel)?;
        let dest = out_dir.join(layout.identity().file_name());

        if dest.exists() && !self.options.overwrite {
            return Err(Error::OutputExists(dest));
        }

        if self.options.dry_run {
            info!("Dry run: would write {}", dest.display());
            report.dry_run = true;
            return Ok(report);
        }

        fs::create_dir_all(out_dir).at(Stage::Write, out_dir)?;
        let is_tree = layout.identity().format == TargetFormat::Tree;
        write_atomic(&dest, self.options.overwrite, is_tree, |tmp| {
            write_package(&layout, tmp)
        })?;
        debug!("{}: {}", wheel.filename, ConversionState::Written);
        info!("Wrote {}", dest.display());

        if !is_tree {
            report.checksums = Some(hash::file_checksums(&dest).at(Stage::Write, &dest)?);
        }
        report.output = Some(dest);
        Ok(report)
    }
}

/// Produce `dest` through a temporary sibling
///
/// `write` receives the temporary path (a file, or an existing empty
/// directory when `is_dir`). The result is renamed over `dest` only when
/// `write` succeeds; on failure the temporary output is removed.
pub fn write_atomic<F>(dest: &Path, overwrite: bool, is_dir: bool, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = format!(
        ".{}.",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");

    if is_dir {
        let temp = builder.tempdir_in(parent).at(Stage::Write, parent)?;
        write(temp.path())?;
        if overwrite && dest.exists() {
            remove_existing(dest)?;
        } else if dest.exists() {
            return Err(Error::OutputExists(dest.to_path_buf()));
        }
        fs::rename(temp.path(), dest).at(Stage::Write, dest)?;
        Ok(())
    } else {
        let temp = builder.tempfile_in(parent).at(Stage::Write, parent)?;
        write(temp.path())?;
        if overwrite {
            if dest.is_dir() {
                remove_existing(dest)?;
            }
            temp.persist(dest)
                .map_err(|e| Error::io(Stage::Write, dest, e.error))?;
        } else {
            temp.persist_noclobber(dest).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::OutputExists(dest.to_path_buf())
                } else {
                    Error::io(Stage::Write, dest, e.error)
                }
            })?;
        }
        Ok(())
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    debug!("Removing existing {}", path.display());
    if path.is_dir() {
        fs::remove_dir_all(path).at(Stage::Write, path)
    } else {
        fs::remove_file(path).at(Stage::Write, path)
    }
}

/// Wheels directly inside `dir`, sorted by name
pub fn find_wheels(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut wheels = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            Error::io(Stage::Unpack, dir, source)
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|e| e == "whl")
        {
            wheels.push(entry.into_path());
        }
    }
    wheels.sort();
    Ok(wheels)
}
