/*!
 * Derived Operations
 * Generic dispatch over the capability contract: directory creation,
 * removal and whole-file writes in terms of the write primitive
 */

use std::path::Path;
use std::sync::Arc;

use super::path;
use super::traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
use super::types::*;

/// Flag-driven open against any backend.
///
/// Delegates to the backend's write extension when present. Backends
/// without one still serve read-only opens through a handle whose
/// `write` always fails; any write-mode request fails outright.
pub fn open_file(
    fsys: &dyn Vfs,
    name: &Path,
    flags: OpenFlags,
    mode: OpenMode,
) -> VfsResult<Option<Box<dyn FileHandle>>> {
    path::canonical(name)?;

    if let Some(wfs) = fsys.as_write_fs() {
        return wfs.open_file(name, flags, mode);
    }

    if flags.is_read_only() {
        let inner = fsys.open(name)?;
        return Ok(Some(Box::new(ReadOnlyHandle { inner })));
    }

    Err(VfsError::unsupported("filesystem does not support write"))
}

/// Create a single directory with the given permission bits.
///
/// Uses the backend's fast path when present, otherwise emulates with
/// a create-open carrying the directory marker.
pub fn make_dir(fsys: &dyn Vfs, name: &Path, mode: Permissions) -> VfsResult<()> {
    if let Some(mfs) = fsys.as_mkdir_fs() {
        return mfs.make_dir(name, mode);
    }

    if let Some(wfs) = fsys.as_write_fs() {
        path::canonical(name)?;
        let flags = OpenFlags::read_only().with_create();
        let handle = wfs.open_file(
            name,
            flags,
            OpenMode {
                permissions: mode,
                directory: true,
            },
        )?;
        drop(handle);
        return Ok(());
    }

    Err(VfsError::unsupported(
        "filesystem does not support creation of directories",
    ))
}

/// Remove a file or an empty directory.
///
/// Uses the backend's fast path when present, otherwise emulates with
/// a truncate-only open.
pub fn remove(fsys: &dyn Vfs, name: &Path) -> VfsResult<()> {
    if let Some(rfs) = fsys.as_remove_fs() {
        return rfs.remove(name);
    }

    if let Some(wfs) = fsys.as_write_fs() {
        path::canonical(name)?;
        let handle = wfs.open_file(name, OpenFlags::remove(), OpenMode::default())?;
        drop(handle);
        return Ok(());
    }

    Err(VfsError::unsupported("filesystem does not support removal"))
}

/// Create or replace a file with the given contents, returning the
/// number of bytes written.
pub fn write_file(fsys: &dyn Vfs, name: &Path, buf: &[u8]) -> VfsResult<usize> {
    let flags = OpenFlags::write_only().with_create().with_truncate();
    let mut file = open_file(fsys, name, flags, OpenMode::new(0o644))?
        .ok_or_else(|| VfsError::InvalidArgument(format!("no handle for {}", name.display())))?;

    let mut written = 0;
    while written < buf.len() {
        let n = file.write(&buf[written..])?;
        if n == 0 {
            return Err(VfsError::Io(format!("short write to {}", name.display())));
        }
        written += n;
    }
    file.sync()?;
    Ok(written)
}

/// Recursive glob over any backend's directory listing.
///
/// `*` and `?` never cross a `/`; matching is against canonical paths.
pub fn glob_walk(fsys: &dyn Vfs, pattern: &str) -> VfsResult<Vec<String>> {
    let compiled = glob::Pattern::new(pattern)
        .map_err(|_| VfsError::InvalidPath(format!("bad pattern: {}", pattern)))?;
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut matched = Vec::new();
    let mut pending = vec![path::ROOT.to_string()];
    while let Some(dir) = pending.pop() {
        for entry in fsys.read_dir(Path::new(&dir))? {
            let full = path::join(&dir, &entry.name);
            if compiled.matches_with(&full, options) {
                matched.push(full.clone());
            }
            if entry.file_type.is_dir() {
                pending.push(full);
            }
        }
    }

    matched.sort();
    Ok(matched)
}

/// Handle adapter that refuses writes
struct ReadOnlyHandle {
    inner: Box<dyn FileHandle>,
}

impl FileHandle for ReadOnlyHandle {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        self.inner.metadata()
    }

    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::read_only_handle())
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        self.inner.entries()
    }
}

/// Generic rooted view over a backend
///
/// Joins its root onto every path and forwards to the wrapped backend;
/// the fallback used by backends without a cheaper `sub`.
pub struct SubFs {
    inner: Arc<dyn Vfs>,
    root: String,
}

impl SubFs {
    pub fn new(inner: Arc<dyn Vfs>, root: impl Into<String>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }

    fn resolve(&self, name: &Path) -> VfsResult<String> {
        let sub = path::canonical(name)?;
        if sub == path::ROOT {
            Ok(self.root.clone())
        } else {
            Ok(format!("{}/{}", self.root, sub))
        }
    }
}

impl Vfs for SubFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let full = self.resolve(name)?;
        self.inner.open(Path::new(&full))
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let full = self.resolve(name)?;
        self.inner.stat(Path::new(&full))
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let full = self.resolve(name)?;
        self.inner.read_dir(Path::new(&full))
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let full = self.resolve(name)?;
        self.inner.read_file(Path::new(&full))
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let full = self.resolve(name)?;
        self.inner.sub(Path::new(&full))
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let scoped = format!("{}/{}", self.root, pattern);
        let prefix = format!("{}/", self.root);
        let matched = self.inner.glob(&scoped)?;
        Ok(matched
            .into_iter()
            .filter_map(|m| m.strip_prefix(&prefix).map(str::to_string))
            .collect())
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

impl WriteFs for SubFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let full = self.resolve(name)?;
        open_file(&*self.inner, Path::new(&full), flags, mode)
    }
}

impl MkDirFs for SubFs {
    fn make_dir(&self, name: &Path, mode: Permissions) -> VfsResult<()> {
        let full = self.resolve(name)?;
        make_dir(&*self.inner, Path::new(&full), mode)
    }
}

impl RemoveFs for SubFs {
    fn remove(&self, name: &Path) -> VfsResult<()> {
        let full = self.resolve(name)?;
        remove(&*self.inner, Path::new(&full))
    }
}
