/*!
 * Capability Contract
 * Core filesystem abstraction traits and optional write extensions
 */

use std::path::Path;
use std::sync::Arc;

use super::types::*;

/// Read-side filesystem contract
///
/// All backends and wrappers implement this trait. Paths are validated
/// before any storage is consulted; operations return taxonomy errors,
/// never panic. Write support is negotiated through the `as_*`
/// capability queries, which default to "not supported".
pub trait Vfs: Send + Sync {
    /// Open the named file or directory for reading
    fn open(&self, path: &Path) -> VfsResult<Box<dyn FileHandle>>;

    /// Get metadata for the named entry
    fn stat(&self, path: &Path) -> VfsResult<Metadata>;

    /// List directory contents, sorted by name
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read entire file contents
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// View of the tree rooted at the named directory
    fn sub(&self, path: &Path) -> VfsResult<Arc<dyn Vfs>>;

    /// Canonical paths matching a glob pattern, sorted
    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>>;

    /// Capability query: flag-driven open with write support
    fn as_write_fs(&self) -> Option<&dyn WriteFs> {
        None
    }

    /// Capability query: native directory creation fast path
    fn as_mkdir_fs(&self) -> Option<&dyn MkDirFs> {
        None
    }

    /// Capability query: native removal fast path
    fn as_remove_fs(&self) -> Option<&dyn RemoveFs> {
        None
    }
}

/// Write extension: the single mandatory write primitive
///
/// `open_file` is the flag-driven state machine described on the
/// in-memory backend. Directory creation and removal outcomes return
/// `Ok(None)`; every other success returns an open handle.
pub trait WriteFs: Vfs {
    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>>;
}

/// Optional fast path for directory creation
pub trait MkDirFs: Vfs {
    fn make_dir(&self, path: &Path, mode: Permissions) -> VfsResult<()>;
}

/// Optional fast path for removal
pub trait RemoveFs: Vfs {
    fn remove(&self, path: &Path) -> VfsResult<()>;
}

/// Open file handle
///
/// Owns a cursor into shared, backend-owned entry state. Dropping the
/// handle releases it; disk-backed handles also flush on `sync`.
pub trait FileHandle: Send {
    /// Metadata for the open entry
    fn metadata(&mut self) -> VfsResult<Metadata>;

    /// Read from the cursor, returning the number of bytes read
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Write at the cursor, returning the number of bytes written
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize>;

    /// Directory handles yield their entries, sorted by name
    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        Err(VfsError::NotADirectory("open handle".to_string()))
    }

    /// Flush backend state; no-op where nothing buffers
    fn sync(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

impl dyn FileHandle {
    /// Drain the handle from its cursor to end of file
    pub fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}
