use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on a dedicated lock file.
///
/// The lock is released when the value is dropped, and by the OS when the
/// holding process exits. A lock file may only be unlinked by someone who
/// holds it; [`LockFile::try_lock`] treats a lock taken on a file that was
/// unlinked or replaced meanwhile as contended, so callers simply retry.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    fn open(path: &Path) -> Result<File> {
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| Error::Lock {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another holder (in this or another process)
    /// owns it.
    pub fn try_lock(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = Self::open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) if !still_linked(&file, path) => Ok(None),
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(source) => Err(Error::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether `path` still names the open `file`.
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(open), Ok(named)) => open.dev() == named.dev() && open.ino() == named.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".debuginfo.lock");

        let held = LockFile::try_lock(&path).unwrap().expect("first lock");
        assert_eq!(held.path(), path);
        assert!(LockFile::try_lock(&path).unwrap().is_none());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".debuginfo.lock");

        drop(LockFile::try_lock(&path).unwrap().expect("first lock"));
        assert!(LockFile::try_lock(&path).unwrap().is_some());
        assert!(path.exists());
    }

    #[test]
    fn test_independent_keys_do_not_contend() {
        let dir = tempdir().unwrap();
        let _a = LockFile::try_lock(dir.path().join(".debuginfo.lock")).unwrap().unwrap();
        let b = LockFile::try_lock(dir.path().join(".executable.lock")).unwrap();
        assert!(b.is_some());
    }

    #[test]
    fn test_unlinked_file_is_not_current() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".debuginfo.lock");
        let file = File::create(&path).unwrap();
        assert!(still_linked(&file, &path));

        std::fs::remove_file(&path).unwrap();
        assert!(!still_linked(&file, &path));

        File::create(&path).unwrap();
        assert!(!still_linked(&file, &path));
    }

    #[test]
    fn test_missing_directory_is_lock_error() {
        let dir = tempdir().unwrap();
        let result = LockFile::try_lock(dir.path().join("nope").join(".lock"));
        assert!(matches!(result, Err(Error::Lock { .. })));
    }
}
