use std::fs::{self, DirEntry, Metadata};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use dbgfetch_fs::{AtomicWriteOptions, LockFile, atomic_write, ensure_dir};
use tracing::{debug, info};

use super::CacheStore;
use crate::error::{Error, Result};

/// Stamp file at the cache root; its mtime is the time of the last cleaning.
pub const CLEAN_STAMP: &str = "cache_clean_interval_s";

/// What a cleaning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed_files: usize,
    pub removed_bytes: u64,
    pub removed_dirs:  usize,
}

fn last_use(meta: &Metadata) -> Option<SystemTime> {
    let modified = meta.modified().ok()?;
    Some(match meta.accessed() {
        Ok(accessed) => accessed.max(modified),
        Err(_) => modified,
    })
}

fn unused_for(meta: &Metadata, now: SystemTime, age: Duration) -> bool {
    last_use(meta)
        .and_then(|used| now.duration_since(used).ok())
        .is_some_and(|idle| idle >= age)
}

fn is_lock_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".lock")
}

fn unwritable(path: &Path, source: io::Error) -> Error {
    Error::CacheUnwritable {
        path: path.to_path_buf(),
        source,
    }
}

impl CacheStore {
    /// Remove entries and leftover temp files unused for `max_unused_age`,
    /// then any build-id directory left with nothing but free lock files.
    ///
    /// A missing cache root is an empty cache.
    pub fn clean(&self, max_unused_age: Duration) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let now = SystemTime::now();

        let dirs = match fs::read_dir(&self.root) {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(unwritable(&self.root, e)),
        };

        for dir in dirs {
            let dir = dir.map_err(|e| unwritable(&self.root, e))?;
            if !dir.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            self.clean_build_id(&dir, now, max_unused_age, &mut report)?;
        }

        info!(
            files = report.removed_files,
            bytes = report.removed_bytes,
            dirs = report.removed_dirs,
            "cache cleaned"
        );
        Ok(report)
    }

    fn clean_build_id(&self, dir: &DirEntry, now: SystemTime, age: Duration, report: &mut CleanReport) -> Result<()> {
        let dir_path = dir.path();
        let mut locks = Vec::new();
        let mut kept = 0usize;

        for entry in fs::read_dir(&dir_path).map_err(|e| unwritable(&dir_path, e))? {
            let entry = entry.map_err(|e| unwritable(&dir_path, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_lock_name(&name) {
                locks.push(path);
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                kept += 1;
                continue;
            };
            if !meta.is_file() || !unused_for(&meta, now, age) {
                kept += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed unused cache file");
                    report.removed_files += 1;
                    report.removed_bytes += meta.len();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(unwritable(&path, e)),
            }
        }

        if kept > 0 {
            return Ok(());
        }

        // Lock files go only while we hold them; a held one keeps the directory.
        let mut held = Vec::with_capacity(locks.len());
        for lock in &locks {
            match LockFile::try_lock(lock)? {
                Some(guard) => held.push(guard),
                None => return Ok(()),
            }
        }
        for lock in &locks {
            fs::remove_file(lock).map_err(|e| unwritable(lock, e))?;
        }
        drop(held);

        match fs::remove_dir(&dir_path) {
            Ok(()) => {
                report.removed_dirs += 1;
                Ok(())
            }
            // A writer raced us into the directory.
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unwritable(&dir_path, e)),
        }
    }

    /// Run [`CacheStore::clean`] if at least `interval` has passed since the
    /// last cleaning.
    ///
    /// The first call on a cache only creates the stamp file. Returns
    /// `None` when no cleaning was due.
    pub fn maybe_clean(&self, interval: Duration, max_unused_age: Duration) -> Result<Option<CleanReport>> {
        ensure_dir(&self.root)?;
        let stamp = self.root.join(CLEAN_STAMP);

        let due = match fs::metadata(&stamp).and_then(|m| m.modified()) {
            Ok(last) => SystemTime::now()
                .duration_since(last)
                .is_ok_and(|since| since >= interval),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                write_stamp(&stamp, interval)?;
                return Ok(None);
            }
            Err(e) => return Err(unwritable(&stamp, e)),
        };
        if !due {
            return Ok(None);
        }

        let report = self.clean(max_unused_age)?;
        write_stamp(&stamp, interval)?;
        Ok(Some(report))
    }
}

fn write_stamp(path: &Path, interval: Duration) -> Result<()> {
    let content = format!("{}\n", interval.as_secs());
    atomic_write(path, content.as_bytes(), AtomicWriteOptions::new().sync(false))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::buildid::BuildId;
    use crate::cache::CachePolicy;
    use std::fs::{File, FileTimes};
    use tempfile::tempdir;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn age(path: &Path, by: Duration) {
        let then = SystemTime::now() - by;
        let times = FileTimes::new().set_accessed(then).set_modified(then);
        File::options().write(true).open(path).unwrap().set_times(times).unwrap();
    }

    fn put(store: &CacheStore, id: &str, artifact: &Artifact, body: &[u8]) -> std::path::PathBuf {
        let id: BuildId = id.parse().unwrap();
        let path = store.entry_path(artifact, &id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        fs::write(store.lock_path(artifact, &id), b"").unwrap();
        path
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("absent"), CachePolicy::default());
        assert_eq!(store.clean(DAY).unwrap(), CleanReport::default());
    }

    #[test]
    fn test_removes_only_unused_entries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());

        let old = put(&store, "aa", &Artifact::DebugInfo, b"0123");
        let fresh = put(&store, "bb", &Artifact::DebugInfo, b"56");
        age(&old, 2 * DAY);

        let report = store.clean(DAY).unwrap();
        assert_eq!(report.removed_files, 1);
        assert_eq!(report.removed_bytes, 4);
        assert_eq!(report.removed_dirs, 1);
        assert!(!dir.path().join("aa").exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_recent_access_keeps_entry() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());
        let path = put(&store, "aa", &Artifact::Executable, b"x");

        let old = SystemTime::now() - 3 * DAY;
        let times = FileTimes::new().set_accessed(SystemTime::now()).set_modified(old);
        File::options().write(true).open(&path).unwrap().set_times(times).unwrap();

        assert_eq!(store.clean(DAY).unwrap().removed_files, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_held_lock_keeps_directory() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());
        let id: BuildId = "aa".parse().unwrap();
        let path = put(&store, "aa", &Artifact::DebugInfo, b"x");
        age(&path, 2 * DAY);

        let _writer = LockFile::try_lock(store.lock_path(&Artifact::DebugInfo, &id)).unwrap().unwrap();
        let report = store.clean(DAY).unwrap();

        assert_eq!(report.removed_files, 1);
        assert_eq!(report.removed_dirs, 0);
        assert!(dir.path().join("aa").exists());
    }

    #[test]
    fn test_stale_temp_files_are_removed() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());
        fs::create_dir(dir.path().join("aa")).unwrap();
        let temp = dir.path().join("aa").join(".debuginfo.Xy12ab.tmp");
        fs::write(&temp, b"partial").unwrap();
        age(&temp, 2 * DAY);

        let report = store.clean(DAY).unwrap();
        assert_eq!(report.removed_files, 1);
        assert!(!temp.exists());
    }

    #[test]
    fn test_maybe_clean_first_call_writes_stamp() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());
        let old = put(&store, "aa", &Artifact::DebugInfo, b"x");
        age(&old, 2 * DAY);

        assert_eq!(store.maybe_clean(DAY, DAY).unwrap(), None);
        assert!(dir.path().join(CLEAN_STAMP).exists());
        assert!(old.exists());
    }

    #[test]
    fn test_maybe_clean_runs_when_due() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), CachePolicy::default());
        let old = put(&store, "aa", &Artifact::DebugInfo, b"x");
        age(&old, 2 * DAY);

        let stamp = dir.path().join(CLEAN_STAMP);
        fs::write(&stamp, b"86400\n").unwrap();
        age(&stamp, 2 * DAY);

        let report = store.maybe_clean(DAY, DAY).unwrap().expect("cleaning was due");
        assert_eq!(report.removed_files, 1);
        assert!(!old.exists());

        // Stamp was refreshed, so nothing is due now.
        assert_eq!(store.maybe_clean(DAY, DAY).unwrap(), None);
    }
}
