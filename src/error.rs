// src/error.rs

//! Error types for the conversion engine

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Conversion stage at which an I/O failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and unpacking the wheel
    Unpack,
    /// Loading the standard rename table
    RenameTable,
    /// Laying out the package tree
    Assemble,
    /// Serializing the package to its destination
    Write,
    /// Reading configuration
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpack => write!(f, "unpack"),
            Self::RenameTable => write!(f, "rename-table"),
            Self::Assemble => write!(f, "assemble"),
            Self::Write => write!(f, "write"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// Errors that can abort a conversion
#[derive(Error, Debug)]
pub enum Error {
    /// A version clause could not be translated at all
    #[error("unsupported specifier '{spec}': {reason}")]
    UnsupportedSpecifier { spec: String, reason: String },

    /// The same name matches two user rules of equal precedence
    #[error("ambiguous rename for '{name}': both '{first}' and '{second}' apply")]
    AmbiguousRename {
        name: String,
        first: String,
        second: String,
    },

    /// The wheel is not a pure python wheel or uses an unsupported feature
    #[error("unsupported wheel content: {0}")]
    UnsupportedContent(String),

    /// Destination already exists and overwrite was not allowed
    #[error("output already exists at '{}'", .0.display())]
    OutputExists(PathBuf),

    /// Read or write failure with the stage and path involved
    #[error("I/O error during {stage} at '{}': {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Package manifest does not match the shipped files
    #[error("package manifest mismatch: {0}")]
    Manifest(String),

    /// Malformed wheel archive or metadata
    #[error("invalid wheel: {0}")]
    InvalidWheel(String),

    /// Malformed user rename or drop rule
    #[error("invalid rule '{pattern}': {reason}")]
    InvalidRule { pattern: String, reason: String },

    /// Malformed configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Zip container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an I/O error with its stage and path
    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Whether this error should be fixed in configuration rather than retried
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousRename { .. } | Self::InvalidRule { .. } | Self::Config(_)
        )
    }
}

/// Attach stage and path context to `io::Result` values
pub(crate) trait IoContext<T> {
    fn at(self, stage: Stage, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, stage: Stage, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(stage, path, e))
    }
}
