//! Errors raised while parsing documents.

use std::io;
use std::path::{Path, PathBuf};

use crate::layout::LAYOUT_PLACEHOLDER;

/// Broad class of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required section or marker is missing or duplicated.
    Structure,
    /// A script reference points somewhere it is not allowed to.
    PathResolution,
    /// The document could not be read.
    Io,
}

/// Errors that can occur when parsing a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Required <html>...</html> section not found in {}", .path.display())]
    MissingBody { path: PathBuf },

    #[error(
        "Layout {} must contain placeholder {LAYOUT_PLACEHOLDER} exactly once (found {count})",
        .path.display()
    )]
    Placeholder { path: PathBuf, count: usize },

    #[error(
        "Script '{reference}' in {} resolves to {}, outside input directory {}",
        .path.display(),
        .resolved.display(),
        .input_dir.display()
    )]
    ScriptOutsideInput {
        path: PathBuf,
        reference: String,
        resolved: PathBuf,
        input_dir: PathBuf,
    },

    #[error(
        "Script '{reference}' in {} lies inside static directory {}",
        .path.display(),
        .static_dir.display()
    )]
    ScriptInStaticDir {
        path: PathBuf,
        reference: String,
        static_dir: PathBuf,
    },

    #[error(
        "Script '{reference}' in {} not found at {}",
        .path.display(),
        .resolved.display()
    )]
    ScriptNotFound {
        path: PathBuf,
        reference: String,
        resolved: PathBuf,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingBody { .. } | Self::Placeholder { .. } => ErrorKind::Structure,
            Self::ScriptOutsideInput { .. }
            | Self::ScriptInStaticDir { .. }
            | Self::ScriptNotFound { .. } => ErrorKind::PathResolution,
            Self::Read { .. } => ErrorKind::Io,
        }
    }

    /// The document the error was raised for.
    pub fn path(&self) -> &Path {
        match self {
            Self::MissingBody { path }
            | Self::Placeholder { path, .. }
            | Self::ScriptOutsideInput { path, .. }
            | Self::ScriptInStaticDir { path, .. }
            | Self::ScriptNotFound { path, .. }
            | Self::Read { path, .. } => path,
        }
    }
}
