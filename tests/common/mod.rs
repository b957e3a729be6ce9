// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Builder for small in-memory wheels
pub struct WheelBuilder {
    name: String,
    version: String,
    requires: Vec<String>,
    extra_metadata: Vec<String>,
    wheel_tag: String,
    purelib: bool,
    files: Vec<(String, Vec<u8>, u32)>,
    entry_points: Option<String>,
}

impl WheelBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            requires: Vec::new(),
            extra_metadata: Vec::new(),
            wheel_tag: "py3-none-any".to_string(),
            purelib: true,
            files: vec![(
                format!("{}/__init__.py", name.replace('-', "_")),
                b"__version__ = '0'\n".to_vec(),
                0o644,
            )],
            entry_points: None,
        }
    }

    pub fn requires(mut self, requirement: &str) -> Self {
        self.requires.push(requirement.to_string());
        self
    }

    pub fn metadata(mut self, header: &str, value: &str) -> Self {
        self.extra_metadata.push(format!("{}: {}", header, value));
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.wheel_tag = tag.to_string();
        self
    }

    pub fn platlib(mut self) -> Self {
        self.purelib = false;
        self
    }

    pub fn file(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        self.files.push((path.to_string(), data.to_vec(), mode));
        self
    }

    pub fn entry_points(mut self, text: &str) -> Self {
        self.entry_points = Some(text.to_string());
        self
    }

    pub fn dist_info(&self) -> String {
        format!("{}-{}.dist-info", self.name.replace('-', "_"), self.version)
    }

    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}.whl",
            self.name.replace('-', "_"),
            self.version,
            self.wheel_tag
        )
    }

    pub fn metadata_text(&self) -> String {
        let mut text = format!(
            "Metadata-Version: 2.1\nName: {}\nVersion: {}\nSummary: Test package {}\n",
            self.name, self.version, self.name
        );
        for line in &self.extra_metadata {
            text.push_str(line);
            text.push('\n');
        }
        for req in &self.requires {
            text.push_str(&format!("Requires-Dist: {}\n", req));
        }
        text.push_str("\nLong description.\n");
        text
    }

    pub fn build(&self) -> Vec<u8> {
        let dist_info = self.dist_info();
        let mut members: Vec<(String, Vec<u8>, u32)> = self.files.clone();
        members.push((
            format!("{}/WHEEL", dist_info),
            format!(
                "Wheel-Version: 1.0\nGenerator: test\nRoot-Is-Purelib: {}\nTag: {}\n",
                self.purelib, self.wheel_tag
            )
            .into_bytes(),
            0o644,
        ));
        members.push((
            format!("{}/METADATA", dist_info),
            self.metadata_text().into_bytes(),
            0o644,
        ));
        if let Some(eps) = &self.entry_points {
            members.push((
                format!("{}/entry_points.txt", dist_info),
                eps.as_bytes().to_vec(),
                0o644,
            ));
        }

        let mut record = String::new();
        for (path, data, _) in &members {
            record.push_str(&format!(
                "{},{},{}\n",
                path,
                whl2conda::hash::record_digest(data),
                data.len()
            ));
        }
        record.push_str(&format!("{}/RECORD,,\n", dist_info));
        members.push((format!("{}/RECORD", dist_info), record.into_bytes(), 0o644));

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, data, mode) in members {
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(mode);
            zip.start_file(path, options).unwrap();
            zip.write_all(&data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Write the wheel into `dir` and return its path
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.filename());
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Members of a `.conda` package: outer names and the decompressed inner tars
pub struct CondaContents {
    pub outer: Vec<String>,
    pub info: Vec<(String, Vec<u8>)>,
    pub pkg: Vec<(String, Vec<u8>)>,
}

impl CondaContents {
    pub fn read(path: &Path) -> Self {
        let bytes = std::fs::read(path).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let outer: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        let mut info = Vec::new();
        let mut pkg = Vec::new();
        for name in &outer {
            if !name.ends_with(".tar.zst") {
                continue;
            }
            let mut data = Vec::new();
            archive.by_name(name).unwrap().read_to_end(&mut data).unwrap();
            let tar = zstd::decode_all(data.as_slice()).unwrap();
            let members = read_tar(&tar);
            if name.starts_with("info-") {
                info = members;
            } else {
                pkg = members;
            }
        }
        Self { outer, info, pkg }
    }

    pub fn info_file(&self, path: &str) -> &[u8] {
        &self
            .info
            .iter()
            .find(|(p, _)| p == path)
            .unwrap_or_else(|| panic!("{} not in info tar", path))
            .1
    }

    pub fn pkg_file(&self, path: &str) -> &[u8] {
        &self
            .pkg
            .iter()
            .find(|(p, _)| p == path)
            .unwrap_or_else(|| panic!("{} not in pkg tar", path))
            .1
    }

    pub fn json(&self, path: &str) -> serde_json::Value {
        serde_json::from_slice(self.info_file(path)).unwrap()
    }
}

/// Paths and contents of every entry in a tar stream, in order
pub fn read_tar(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(bytes);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (path, data)
        })
        .collect()
}

/// Decompress and read a `.tar.bz2` package
pub fn read_tar_bz2(path: &Path) -> Vec<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).unwrap();
    let mut tar = Vec::new();
    bzip2::read::BzDecoder::new(bytes.as_slice())
        .read_to_end(&mut tar)
        .unwrap();
    read_tar(&tar)
}
