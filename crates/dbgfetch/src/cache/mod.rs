//! The on-disk artifact cache.
//!
//! Layout under the root:
//!
//! ```text
//! {root}/{build-id}/debuginfo
//! {root}/{build-id}/executable
//! {root}/{build-id}/source-{path with / as #}
//! {root}/{build-id}/.{name}.lock
//! {root}/cache_clean_interval_s
//! ```
//!
//! Entries only ever appear at their final path by rename, so a file there
//! is complete.

mod clean;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use dbgfetch_fs::{AtomicWriteOptions, LockFile, StagedFile, ensure_dir};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::buildid::BuildId;
use crate::error::{Error, Result};

pub use clean::{CLEAN_STAMP, CleanReport};

/// What to do when a cache lock is still held after `lock_timeout`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleLockPolicy {
    /// Fetch without the lock. The final rename is still atomic, so the
    /// worst case is a duplicate download.
    #[default]
    FetchAnyway,
    /// Fail the lookup with [`Error::LockTimeout`].
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entries older than this are treated as missing. `None` keeps them forever.
    pub max_age:        Option<Duration>,
    pub lock_timeout:   Duration,
    /// Delay between lock attempts while another holder has the key.
    pub lock_poll:      Duration,
    pub stale_lock:     StaleLockPolicy,
    /// Minimum time between automatic cleanings.
    pub clean_interval: Option<Duration>,
    /// Entries unused for this long are removed by a cleaning.
    pub max_unused_age: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age:        None,
            lock_timeout:   Duration::from_secs(30),
            lock_poll:      Duration::from_millis(50),
            stale_lock:     StaleLockPolicy::default(),
            clean_interval: None,
            max_unused_age: None,
        }
    }
}

impl CachePolicy {
    #[must_use]
    pub fn max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn lock_poll(mut self, poll: Duration) -> Self {
        self.lock_poll = poll;
        self
    }

    #[must_use]
    pub fn stale_lock(mut self, policy: StaleLockPolicy) -> Self {
        self.stale_lock = policy;
        self
    }

    #[must_use]
    pub fn cleaning(mut self, interval: Duration, max_unused_age: Duration) -> Self {
        self.clean_interval = Some(interval);
        self.max_unused_age = Some(max_unused_age);
        self
    }
}

/// A complete file in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path:     PathBuf,
    pub size:     u64,
    pub modified: SystemTime,
}

impl CacheEntry {
    fn stat(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "cache entry is not a regular file"));
        }
        Ok(Self {
            path:     path.to_path_buf(),
            size:     meta.len(),
            modified: meta.modified()?,
        })
    }

    fn is_older_than(&self, age: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.modified)
            .is_ok_and(|elapsed| elapsed > age)
    }
}

/// Permission to write one cache entry.
///
/// Holds the key's lock, unless the lock timed out under
/// [`StaleLockPolicy::FetchAnyway`]. Dropping the handle releases the lock.
#[derive(Debug)]
pub struct WriteHandle {
    destination: PathBuf,
    lock:        Option<LockFile>,
}

impl WriteHandle {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}

#[derive(Debug)]
pub enum WriteOutcome {
    /// Another writer finished the entry while we waited.
    Cached(CacheEntry),
    Write(WriteHandle),
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root:   PathBuf,
    policy: CachePolicy,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn entry_path(&self, artifact: &Artifact, id: &BuildId) -> PathBuf {
        self.root.join(id.as_str()).join(artifact.cache_name())
    }

    pub fn lock_path(&self, artifact: &Artifact, id: &BuildId) -> PathBuf {
        self.root
            .join(id.as_str())
            .join(format!(".{}.lock", artifact.cache_name()))
    }

    /// The entry for `(artifact, id)` if it exists and is not stale.
    pub fn check(&self, artifact: &Artifact, id: &BuildId) -> Option<CacheEntry> {
        let path = self.entry_path(artifact, id);
        let entry = match CacheEntry::stat(&path) {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unusable cache entry");
                return None;
            }
        };

        match self.policy.max_age {
            Some(max_age) if entry.is_older_than(max_age) => {
                debug!(path = %path.display(), "cache entry is stale");
                None
            }
            _ => Some(entry),
        }
    }

    /// Take the key's lock, or learn that someone else just filled it.
    ///
    /// # Errors
    ///
    /// - [`Error::CacheUnwritable`] when the entry directory or lock file
    ///   cannot be created
    /// - [`Error::LockTimeout`] when the lock stays held past `lock_timeout`
    ///   and the policy is [`StaleLockPolicy::Fail`]
    pub async fn begin_write(&self, artifact: &Artifact, id: &BuildId) -> Result<WriteOutcome> {
        let destination = self.entry_path(artifact, id);
        let lock_path = self.lock_path(artifact, id);

        let started = Instant::now();
        let mut announced = false;
        loop {
            // A cleaner may remove the directory and its free lock files
            // between attempts, so both are recreated every time.
            let attempt = match destination.parent() {
                Some(dir) => ensure_dir(dir).and_then(|()| LockFile::try_lock(&lock_path)),
                None => LockFile::try_lock(&lock_path),
            };
            match attempt {
                Ok(Some(lock)) => {
                    if let Some(entry) = self.check(artifact, id) {
                        debug!(path = %entry.path.display(), "entry completed by another holder");
                        return Ok(WriteOutcome::Cached(entry));
                    }
                    return Ok(WriteOutcome::Write(WriteHandle {
                        destination,
                        lock: Some(lock),
                    }));
                }
                Ok(None) => {}
                Err(e) if e.io_error().kind() == io::ErrorKind::NotFound => {
                    debug!(path = %e.path().display(), "entry directory removed while locking, retrying");
                }
                Err(e) => return Err(e.into()),
            }

            let waited = started.elapsed();
            if waited >= self.policy.lock_timeout {
                return match self.policy.stale_lock {
                    StaleLockPolicy::Fail => Err(Error::LockTimeout {
                        path: lock_path,
                        waited,
                    }),
                    StaleLockPolicy::FetchAnyway => {
                        warn!(lock = %lock_path.display(), ?waited, "lock still held, fetching without it");
                        match self.check(artifact, id) {
                            Some(entry) => Ok(WriteOutcome::Cached(entry)),
                            None => Ok(WriteOutcome::Write(WriteHandle {
                                destination,
                                lock: None,
                            })),
                        }
                    }
                };
            }

            if !announced {
                debug!(lock = %lock_path.display(), "waiting for cache lock");
                announced = true;
            }
            let remaining = self.policy.lock_timeout - waited;
            tokio::time::sleep(self.policy.lock_poll.min(remaining)).await;
        }
    }

    /// Write `body` as the entry and release the lock.
    ///
    /// The write and its fsync run on the blocking pool.
    pub async fn commit(&self, handle: WriteHandle, body: Bytes) -> Result<CacheEntry> {
        let destination = handle.destination().to_path_buf();
        tokio::task::spawn_blocking(move || Self::commit_blocking(handle, &body))
            .await
            .map_err(|e| Error::CacheUnwritable {
                path:   destination,
                source: io::Error::other(e),
            })?
    }

    fn commit_blocking(handle: WriteHandle, body: &[u8]) -> Result<CacheEntry> {
        let mut staged = StagedFile::new(&handle.destination)?;
        debug!(
            temp = %staged.path().display(),
            dest = %staged.destination().display(),
            lock = ?handle.lock.as_ref().map(LockFile::path),
            "staging cache entry"
        );
        staged.write_all(body)?;
        let path = staged.commit(AtomicWriteOptions::new())?;
        drop(handle);

        CacheEntry::stat(&path).map_err(|source| Error::CacheUnwritable { path, source })
    }

    /// Give up on a write; the lock is released and nothing is left behind.
    pub fn abort(&self, handle: WriteHandle) {
        debug!(path = %handle.destination.display(), "abandoning cache write");
        drop(handle);
    }
}
