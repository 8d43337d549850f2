use crate::rw::AtomicWriteOptions;
use crate::{Error, Result};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file being written beside its final destination.
///
/// The data lives in a hidden `.{name}.XXXXXX.tmp` file in the destination's
/// directory until [`StagedFile::commit`] renames it into place. Renaming
/// within one directory is atomic, so the destination is either absent (or
/// its previous content) or fully written. Dropping an uncommitted
/// `StagedFile` removes the temporary file.
pub struct StagedFile {
    temp:        NamedTempFile,
    destination: PathBuf,
}

impl StagedFile {
    pub fn new(destination: impl AsRef<Path>) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = destination
            .file_name()
            .unwrap_or_else(|| OsStr::new("staged"))
            .to_string_lossy()
            .into_owned();

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|source| Error::Write {
                path: parent.clone(),
                source,
            })?;

        Ok(Self { temp, destination })
    }

    /// Path of the temporary file currently holding the data.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.temp
            .as_file_mut()
            .write_all(bytes)
            .map_err(|source| Error::Write {
                path: self.temp.path().to_path_buf(),
                source,
            })
    }

    /// Apply `options` and rename the temporary file onto the destination.
    pub fn commit(self, options: AtomicWriteOptions) -> Result<PathBuf> {
        let temp_path = self.temp.path().to_path_buf();

        #[cfg(unix)]
        if let Some(mode) = options.permissions {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).map_err(
                |source| Error::Write {
                    path: temp_path.clone(),
                    source,
                },
            )?;
        }

        if options.sync {
            self.temp
                .as_file()
                .sync_all()
                .map_err(|source| Error::Write {
                    path: temp_path.clone(),
                    source,
                })?;
        }

        let destination = self.destination;
        self.temp
            .persist(&destination)
            .map_err(|e| Error::Write {
                path:   destination.clone(),
                source: e.error,
            })?;

        Ok(destination)
    }
}
