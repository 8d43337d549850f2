//! Filesystem primitives for the dbgfetch cache.
//!
//! - [`StagedFile`] writes into a hidden temporary file next to its destination
//!   and renames it into place on commit, so readers never see a partial file.
//! - [`LockFile`] is an advisory, cross-process exclusive lock held on a
//!   dedicated lock file.
//! - [`atomic_write`] is the one-shot form of [`StagedFile`].

mod error;
mod lock;
mod rw;
mod staged;

pub use error::{Error, Result};
pub use lock::LockFile;
pub use rw::{AtomicWriteOptions, atomic_write, ensure_dir};
pub use staged::StagedFile;

#[cfg(unix)]
pub(crate) const DEFAULT_PERMISSIONS: u32 = 0o644;
