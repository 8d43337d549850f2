use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write {}", .path.display())]
    Write {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {}", .path.display())]
    CreateDir {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock {}", .path.display())]
    Lock {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// The path the failed operation was acting on.
    pub fn path(&self) -> &Path {
        match self {
            Error::Write { path, .. }
            | Error::CreateDir { path, .. }
            | Error::Lock { path, .. } => path,
        }
    }

    pub fn io_error(&self) -> &io::Error {
        match self {
            Error::Write { source, .. }
            | Error::CreateDir { source, .. }
            | Error::Lock { source, .. } => source,
        }
    }

    pub fn into_parts(self) -> (PathBuf, io::Error) {
        match self {
            Error::Write { path, source }
            | Error::CreateDir { path, source }
            | Error::Lock { path, source } => (path, source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
