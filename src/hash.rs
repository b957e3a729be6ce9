// src/hash.rs

//! Digests used by conda package manifests and wheel records
//!
//! | Use | Algorithm | Encoding |
//! |-----|-----------|----------|
//! | `info/paths.json` entries | SHA-256 | lowercase hex |
//! | Output archive checksums (repodata) | SHA-256 and MD5 | lowercase hex |
//! | Wheel `RECORD` entries | SHA-256 | urlsafe base64, no padding |

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use md5::Md5;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// SHA-256 as lowercase hex
#[inline]
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// MD5 as lowercase hex
#[inline]
pub fn md5(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Digest field for a wheel `RECORD` line (`sha256=<urlsafe-b64>`)
pub fn record_digest(data: &[u8]) -> String {
    format!("sha256={}", URL_SAFE_NO_PAD.encode(Sha256::digest(data)))
}

/// Checksums of a written package archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChecksums {
    pub sha256: String,
    pub md5: String,
    pub size: u64,
}

/// Stream a file once and compute both archive checksums
pub fn file_checksums(path: &Path) -> io::Result<FileChecksums> {
    let mut file = File::open(path)?;
    let mut sha = Sha256::new();
    let mut md = Md5::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        sha.update(&buffer[..n]);
        md.update(&buffer[..n]);
        size += n as u64;
    }

    Ok(FileChecksums {
        sha256: hex::encode(sha.finalize()),
        md5: hex::encode(md.finalize()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_md5_known_value() {
        assert_eq!(md5(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_record_digest() {
        // sha256("") in urlsafe base64 without padding
        assert_eq!(
            record_digest(b""),
            "sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[test]
    fn test_file_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.conda");
        std::fs::write(&path, b"hello world").unwrap();

        let sums = file_checksums(&path).unwrap();
        assert_eq!(sums.size, 11);
        assert_eq!(sums.sha256, sha256(b"hello world"));
        assert_eq!(sums.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }
}
