use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::buildid::BuildId;
use crate::error::{Error, Result};

/// Characters escaped in a source path. `/` stays literal so the server sees
/// the path structure.
const SOURCE_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The kind of file a lookup resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Artifact {
    DebugInfo,
    Executable,
    /// A source file, named by the path recorded in the debug info.
    Source { filename: String },
}

impl Artifact {
    /// A source artifact for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilename`] for an empty name or one containing
    /// a NUL byte.
    pub fn source(filename: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        if filename.is_empty() || filename.contains('\0') {
            return Err(Error::InvalidFilename(filename));
        }
        Ok(Artifact::Source { filename })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Artifact::DebugInfo => "debuginfo",
            Artifact::Executable => "executable",
            Artifact::Source { .. } => "source",
        }
    }

    /// Path suffix after `/buildid/{id}/`.
    ///
    /// ```
    /// use dbgfetch::Artifact;
    ///
    /// let src = Artifact::source("/usr/src/a b.c").unwrap();
    /// assert_eq!(src.url_suffix(), "source/usr/src/a%20b.c");
    /// assert_eq!(Artifact::DebugInfo.url_suffix(), "debuginfo");
    /// ```
    pub fn url_suffix(&self) -> String {
        match self {
            Artifact::Source { filename } => {
                let trimmed = filename.trim_start_matches('/');
                format!("source/{}", utf8_percent_encode(trimmed, SOURCE_PATH))
            }
            other => other.kind_name().to_string(),
        }
    }

    /// File name of the entry inside a build-id's cache directory.
    ///
    /// Source paths are flattened by replacing `/` with `#`, so every entry
    /// of a build-id lives directly in its directory. Literal `%` and `#` are
    /// escaped first to keep distinct paths apart.
    pub fn cache_name(&self) -> String {
        match self {
            Artifact::Source { filename } => {
                let flat = filename.replace('%', "%25").replace('#', "%23").replace('/', "#");
                format!("source-{flat}")
            }
            other => other.kind_name().to_string(),
        }
    }

    /// Full request URL on the server rooted at `base`.
    pub fn url(&self, base: &str, id: &BuildId) -> String {
        format!("{}/buildid/{}/{}", base.trim_end_matches('/'), id, self.url_suffix())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Source { filename } => write!(f, "source {filename}"),
            other => f.write_str(other.kind_name()),
        }
    }
}
