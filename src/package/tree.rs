// src/package/tree.rs

//! Unpacked package tree, mainly for inspection and tests

use super::writer::PackageWriter;
use crate::error::{IoContext, Result, Stage};
use std::fs;
use std::path::{Path, PathBuf};

pub struct TreeWriter {
    root: PathBuf,
}

impl TreeWriter {
    /// Write members below `root`, which is created if missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).at(Stage::Write, &root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageWriter for TreeWriter {
    fn write_member(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        let dest = self.root.join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(Stage::Write, parent)?;
        }
        fs::write(&dest, data).at(Stage::Write, &dest)?;
        set_mode(&dest, mode)
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).at(Stage::Write, path)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
