// src/package/writer.rs

//! Serialization backends for an assembled package

use crate::error::{IoContext, Result, Stage};
use std::io::Write;

/// Sink for package members
///
/// Members arrive in final order: every `info/` member first, then content,
/// each group sorted by path.
pub trait PackageWriter {
    /// Add one regular file
    fn write_member(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()>;

    /// Flush everything to the destination; no members may follow
    fn finalize(&mut self) -> Result<()>;
}

/// Append a regular file with a fixed mtime and root ownership
pub(crate) fn append_tar_member<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    mode: u32,
    mtime: u64,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(mode);
    header.set_size(data.len() as u64);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header.set_cksum();

    builder.append_data(&mut header, path, data).at(Stage::Write, path)
}

/// Clamp a unix timestamp to what tar headers can carry
pub(crate) fn tar_mtime(timestamp: i64) -> u64 {
    u64::try_from(timestamp).unwrap_or(0)
}
