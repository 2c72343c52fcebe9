/*!
 * Deferred-Initialization Wrapper
 * Builds the inner filesystem on first use; failures are retried
 */

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::ops;
use super::traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
use super::types::*;

type Factory = dyn Fn() -> VfsResult<Arc<dyn Vfs>> + Send + Sync;

/// Wrapper that defers construction of its inner filesystem
///
/// The factory runs on the first call to any operation. A successful
/// build is cached for the wrapper's lifetime; a failed build is not,
/// so the factory runs again on every subsequent call until it
/// succeeds, and each failing call surfaces the factory's error.
pub struct LazyFs {
    factory: Box<Factory>,
    inner: RwLock<Option<Arc<dyn Vfs>>>,
}

impl LazyFs {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> VfsResult<Arc<dyn Vfs>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            inner: RwLock::new(None),
        }
    }

    fn get(&self) -> VfsResult<Arc<dyn Vfs>> {
        if let Some(fsys) = self.inner.read().as_ref() {
            return Ok(Arc::clone(fsys));
        }

        let mut slot = self.inner.write();
        // Another caller may have won the race while we waited.
        if let Some(fsys) = slot.as_ref() {
            return Ok(Arc::clone(fsys));
        }
        match (self.factory)() {
            Ok(fsys) => {
                debug!("deferred filesystem initialized");
                *slot = Some(Arc::clone(&fsys));
                Ok(fsys)
            }
            Err(e) => {
                warn!(error = %e, "deferred filesystem initialization failed");
                Err(e)
            }
        }
    }
}

impl Vfs for LazyFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        self.get()?.open(name)
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        self.get()?.stat(name)
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        self.get()?.read_dir(name)
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        self.get()?.read_file(name)
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        self.get()?.sub(name)
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        self.get()?.glob(pattern)
    }

    fn as_write_fs(&self) -> Option<&dyn WriteFs> {
        Some(self)
    }

    fn as_mkdir_fs(&self) -> Option<&dyn MkDirFs> {
        Some(self)
    }

    fn as_remove_fs(&self) -> Option<&dyn RemoveFs> {
        Some(self)
    }
}

impl WriteFs for LazyFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let fsys = self.get()?;
        ops::open_file(&*fsys, name, flags, mode)
    }
}

impl MkDirFs for LazyFs {
    fn make_dir(&self, name: &Path, mode: Permissions) -> VfsResult<()> {
        let fsys = self.get()?;
        ops::make_dir(&*fsys, name, mode)
    }
}

impl RemoveFs for LazyFs {
    fn remove(&self, name: &Path) -> VfsResult<()> {
        let fsys = self.get()?;
        ops::remove(&*fsys, name)
    }
}
