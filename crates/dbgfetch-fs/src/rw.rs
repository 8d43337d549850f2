use crate::staged::StagedFile;
use crate::{Error, Result};
use std::path::Path;

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    pub permissions: Option<u32>,
    pub sync:        bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            permissions: Some(crate::DEFAULT_PERMISSIONS),
            #[cfg(not(unix))]
            permissions: None,
            sync: true,
        }
    }

    pub fn permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode);
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

pub fn atomic_write(path: impl AsRef<Path>, content: &[u8], options: AtomicWriteOptions) -> Result<()> {
    let mut staged = StagedFile::new(path)?;
    staged.write_all(content)?;
    staged.commit(options)?;
    Ok(())
}

/// Create `path` and any missing parents.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|source| Error::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
