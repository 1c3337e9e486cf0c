//! Receipt source files and their classification

use std::fmt;
use std::path::{Path, PathBuf};
use crate::error::{Error, Result};

/// How a source file is turned into pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Existing PDF, every page is kept
    Pdf,
    /// PNG or JPEG image, becomes exactly one page
    Raster,
}

impl SourceKind {
    /// Classify a path by its extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "png" | "jpg" | "jpeg" => Some(SourceKind::Raster),
            _ => None,
        }
    }
}

/// A receipt file to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self { path: path.into(), kind }
    }

    /// Build a source from a path, inferring its kind from the extension
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match SourceKind::from_path(&path) {
            Some(kind) => Ok(Self { path, kind }),
            None => Err(Error::UnsupportedFormat(path)),
        }
    }

    /// Classify a list of paths, keeping input order.
    ///
    /// Unsupported paths come back as `Err` entries so the normalizer can
    /// report them alongside unreadable files.
    pub fn classify_all<I, P>(paths: I) -> Vec<std::result::Result<SourceFile, SourceError>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(|p| {
                let path = p.into();
                SourceFile::from_path(path.clone()).map_err(|reason| SourceError { path, reason })
            })
            .collect()
    }
}

/// A source that contributed no pages, and why
#[derive(Debug)]
pub struct SourceError {
    pub path: PathBuf,
    pub reason: Error,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}
