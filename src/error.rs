//! Error types for tree building and checksum calculation.
//!
//! Build errors abort the whole `build` call and reach the caller. Checksum errors never leave
//! the writer thread; they are turned into [`Event::Error`](crate::events::Event::Error).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while turning a filesystem path into a [`FileNode`](crate::FileNode).
#[derive(Error, Debug)]
pub enum BuildError {
    /// A symlink or shortcut led back to a path already on the active resolution chain.
    #[error("cycle detected while resolving {}", path.display())]
    CycleDetected { path: PathBuf },

    /// The entry (or a link target) could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, BuildError::CycleDetected { .. })
    }
}

/// Failure while computing a digest for one file.
#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("checksum algorithm `{0}` is not available")]
    AlgorithmUnavailable(String),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}
