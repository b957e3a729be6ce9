// src/lib.rs

//! whl2conda conversion engine
//!
//! Converts pure python wheels into `noarch: python` conda packages without
//! a conda build environment.
//!
//! # Architecture
//!
//! - `wheel`: open and validate the wheel, parse `WHEEL`, `METADATA` and entry points
//! - `specifier` + `rename`: translate each `Requires-Dist` entry into a conda match spec
//! - `rewrite`: produce the conda metadata and a `METADATA` with hidden pip dependencies
//! - `package`: lay out `info/` and `site-packages/`, serialize as `.conda`, `.tar.bz2` or a tree
//! - `convert`: drive the stages and write the output atomically
//!
//! ```no_run
//! use whl2conda::{ConversionOptions, Converter, StandardRenameTable};
//! use std::path::Path;
//!
//! let table = StandardRenameTable::load_or_default(None);
//! let converter = Converter::new(ConversionOptions::default(), Some(table))?;
//! let report = converter.convert_file(Path::new("dist/demo-1.0-py3-none-any.whl"))?;
//! report.print_summary();
//! # Ok::<(), whl2conda::Error>(())
//! ```

pub mod compression;
pub mod config;
pub mod convert;
mod error;
pub mod hash;
pub mod package;
pub mod rename;
pub mod report;
pub mod rewrite;
pub mod specifier;
pub mod wheel;

pub use config::{ConversionOptions, ProjectConfig, RenameRuleSpec};
pub use convert::{ConversionState, Converter};
pub use error::{Error, Result, Stage};
pub use package::TargetFormat;
pub use rename::{RenameResolver, RenameRule, StandardRenameTable};
pub use report::ConversionReport;
pub use wheel::Wheel;
