/*!
 * Mutual-Exclusion Wrapper
 * Serializes every call against a backend that is not concurrency-safe
 */

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use super::ops;
use super::traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
use super::types::*;

/// Wrapper holding one coarse lock around the inner filesystem
///
/// The lock is acquired for the full duration of each call and released
/// on every exit path, errors included. All operations against the
/// wrapped instance are totally ordered. Handles returned by `open` and
/// `open_file` outlive the call and are NOT serialized; this wrapper
/// adds safety for the filesystem operations themselves, not
/// throughput.
pub struct SyncFs {
    lock: Mutex<()>,
    inner: Arc<dyn Vfs>,
}

impl SyncFs {
    pub fn new(inner: Arc<dyn Vfs>) -> Self {
        Self {
            lock: Mutex::new(()),
            inner,
        }
    }
}

impl Vfs for SyncFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let _guard = self.lock.lock();
        self.inner.open(name)
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let _guard = self.lock.lock();
        self.inner.stat(name)
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let _guard = self.lock.lock();
        self.inner.read_dir(name)
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let _guard = self.lock.lock();
        self.inner.read_file(name)
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let _guard = self.lock.lock();
        self.inner.sub(name)
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let _guard = self.lock.lock();
        self.inner.glob(pattern)
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

impl WriteFs for SyncFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let _guard = self.lock.lock();
        ops::open_file(&*self.inner, name, flags, mode)
    }
}

impl MkDirFs for SyncFs {
    fn make_dir(&self, name: &Path, mode: Permissions) -> VfsResult<()> {
        let _guard = self.lock.lock();
        ops::make_dir(&*self.inner, name, mode)
    }
}

impl RemoveFs for SyncFs {
    fn remove(&self, name: &Path) -> VfsResult<()> {
        let _guard = self.lock.lock();
        ops::remove(&*self.inner, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemFs;
    use std::thread;

    #[test]
    fn test_serializes_backend_access() {
        let fsys = Arc::new(SyncFs::new(Arc::new(MemFs::new())));
        ops::make_dir(&*fsys, Path::new("d"), Permissions::dir_default()).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let fsys = Arc::clone(&fsys);
            handles.push(thread::spawn(move || {
                let name = format!("d/file{}", i);
                ops::write_file(&*fsys, Path::new(&name), name.as_bytes()).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(fsys.read_dir(Path::new("d")).unwrap().len(), 8);
        for i in 0..8 {
            let name = format!("d/file{}", i);
            assert_eq!(
                fsys.read_file(Path::new(&name)).unwrap(),
                name.as_bytes()
            );
        }
    }

    #[test]
    fn test_lock_released_on_error() {
        let fsys = SyncFs::new(Arc::new(MemFs::new()));
        assert!(fsys.stat(Path::new("missing")).is_err());
        // A poisoned or leaked guard would deadlock here.
        assert!(fsys.stat(Path::new(".")).is_ok());
    }
}
