// src/package/legacy.rs

//! Legacy `.tar.bz2` package format
//!
//! The whole package is one bzip2-compressed tarball. Conda reads `info/`
//! members before extracting, so they are written first.

use super::writer::{PackageWriter, append_tar_member, tar_mtime};
use crate::compression::bzip2_writer;
use crate::error::{Error, IoContext, Result, Stage};
use std::io::Write;

pub struct TarBz2Writer<W: Write> {
    builder: Option<tar::Builder<bzip2::write::BzEncoder<W>>>,
    mtime: u64,
}

impl<W: Write> TarBz2Writer<W> {
    pub fn new(inner: W, timestamp: i64) -> Self {
        Self {
            builder: Some(tar::Builder::new(bzip2_writer(inner))),
            mtime: tar_mtime(timestamp),
        }
    }

    fn builder(&mut self) -> Result<&mut tar::Builder<bzip2::write::BzEncoder<W>>> {
        self.builder
            .as_mut()
            .ok_or_else(|| Error::Manifest("member written after finalize".to_string()))
    }
}

impl<W: Write> PackageWriter for TarBz2Writer<W> {
    fn write_member(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        let mtime = self.mtime;
        append_tar_member(self.builder()?, path, data, mode, mtime)
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(builder) = self.builder.take() else {
            return Ok(());
        };
        let encoder = builder.into_inner().at(Stage::Write, "tar")?;
        let mut inner = encoder.finish().at(Stage::Write, "bzip2")?;
        inner.flush().at(Stage::Write, "output")
    }
}
