use crate::error::ScanError;
use std::path::{Path, PathBuf};

/// An absolute, validated filesystem path to scan.
///
/// Construction is the only validation point: once a `ScanTarget` exists the
/// path existed and was readable at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    path: PathBuf,
    is_dir: bool,
}

impl ScanTarget {
    /// Resolve `path` to an absolute path and check it can be read.
    pub fn resolve(path: &Path) -> Result<Self, ScanError> {
        if !path.exists() {
            return Err(ScanError::TargetNotFound(path.to_path_buf()));
        }

        let absolute = path
            .canonicalize()
            .map_err(|source| ScanError::TargetNotReadable {
                path: path.to_path_buf(),
                source,
            })?;

        let is_dir = absolute.is_dir();
        let readable = if is_dir {
            std::fs::read_dir(&absolute).map(|_| ())
        } else {
            std::fs::File::open(&absolute).map(|_| ())
        };
        readable.map_err(|source| ScanError::TargetNotReadable {
            path: absolute.clone(),
            source,
        })?;

        Ok(Self {
            path: absolute,
            is_dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Directory tools should run in when they need to be "inside" the target.
    /// For a single-file target this is the file's parent directory.
    pub fn root_dir(&self) -> &Path {
        if self.is_dir {
            &self.path
        } else {
            self.path.parent().unwrap_or(&self.path)
        }
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.path.display()
    }
}
