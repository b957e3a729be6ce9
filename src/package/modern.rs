// src/package/modern.rs

//! `.conda` package format (version 2)
//!
//! An uncompressed zip holding, in order:
//!
//! - `metadata.json`: `{"conda_pkg_format_version": 2}`
//! - `info-<stem>.tar.zst`: the `info/` members
//! - `pkg-<stem>.tar.zst`: everything else

use super::writer::{PackageWriter, append_tar_member, tar_mtime};
use crate::compression::{CompressionFormat, compress};
use crate::error::{Error, IoContext, Result, Stage};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::io::{Seek, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const FORMAT_VERSION: u32 = 2;

pub struct CondaWriter<W: Write + Seek> {
    zip: Option<zip::ZipWriter<W>>,
    stem: String,
    info: tar::Builder<Vec<u8>>,
    pkg: tar::Builder<Vec<u8>>,
    mtime: u64,
    zip_time: zip::DateTime,
}

impl<W: Write + Seek> CondaWriter<W> {
    /// `stem` is the package file name without `.conda`
    pub fn new(inner: W, stem: impl Into<String>, timestamp: i64) -> Self {
        Self {
            zip: Some(zip::ZipWriter::new(inner)),
            stem: stem.into(),
            info: tar::Builder::new(Vec::new()),
            pkg: tar::Builder::new(Vec::new()),
            mtime: tar_mtime(timestamp),
            zip_time: zip_datetime(timestamp),
        }
    }

    fn add_stored(
        zip: &mut zip::ZipWriter<W>,
        name: &str,
        data: &[u8],
        time: zip::DateTime,
    ) -> Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(time)
            .unix_permissions(0o644);
        zip.start_file(name, options)?;
        zip.write_all(data).at(Stage::Write, name)
    }
}

impl<W: Write + Seek> PackageWriter for CondaWriter<W> {
    fn write_member(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        if self.zip.is_none() {
            return Err(Error::Manifest("member written after finalize".to_string()));
        }
        let builder = if path.starts_with("info/") {
            &mut self.info
        } else {
            &mut self.pkg
        };
        append_tar_member(builder, path, data, mode, self.mtime)
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(mut zip) = self.zip.take() else {
            return Ok(());
        };

        let info_tar = std::mem::replace(&mut self.info, tar::Builder::new(Vec::new()))
            .into_inner()
            .at(Stage::Write, "info tar")?;
        let pkg_tar = std::mem::replace(&mut self.pkg, tar::Builder::new(Vec::new()))
            .into_inner()
            .at(Stage::Write, "pkg tar")?;

        let metadata = serde_json::to_vec(&serde_json::json!({
            "conda_pkg_format_version": FORMAT_VERSION
        }))?;
        let info_zst = compress(&info_tar, CompressionFormat::Zstd)
            .map_err(|e| Error::io(Stage::Write, "info tar", std::io::Error::other(e)))?;
        let pkg_zst = compress(&pkg_tar, CompressionFormat::Zstd)
            .map_err(|e| Error::io(Stage::Write, "pkg tar", std::io::Error::other(e)))?;

        Self::add_stored(&mut zip, "metadata.json", &metadata, self.zip_time)?;
        Self::add_stored(&mut zip, &format!("info-{}.tar.zst", self.stem), &info_zst, self.zip_time)?;
        Self::add_stored(&mut zip, &format!("pkg-{}.tar.zst", self.stem), &pkg_zst, self.zip_time)?;

        let mut inner = zip.finish()?;
        inner.flush().at(Stage::Write, "output")
    }
}

/// Zip timestamps start in 1980; earlier times use the zip default
fn zip_datetime(timestamp: i64) -> zip::DateTime {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .and_then(|t| {
            let year = u16::try_from(t.year()).ok()?;
            zip::DateTime::from_date_and_time(
                year,
                t.month() as u8,
                t.day() as u8,
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}
