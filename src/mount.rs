/*!
 * Mount Table
 * Groups named sub-filesystems under one virtual root
 */

use ahash::RandomState;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::ops;
use super::path;
use super::traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
use super::types::*;

/// Composition layer over named backends
///
/// The first path segment selects a mount; the remainder is resolved
/// inside it. The virtual root lists the mount names, and a mount's
/// root reports the mount name instead of the sub-filesystem's own
/// identity. Write-style calls delegate to the resolved backend the
/// same way read calls do.
#[derive(Clone)]
pub struct MountFs {
    mounts: Arc<DashMap<String, Arc<dyn Vfs>, RandomState>>,
}

/// Outcome of resolving a path against the mount table
struct Resolved {
    fsys: Arc<dyn Vfs>,
    mount: String,
    sub: String,
}

impl MountFs {
    /// Create an empty mount table
    pub fn new() -> Self {
        Self {
            mounts: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    /// Register a backend under `name`; an existing registration with
    /// the same name is replaced.
    pub fn mount(&self, name: impl Into<String>, fsys: Arc<dyn Vfs>) -> VfsResult<()> {
        let name = name.into();
        if name == path::ROOT || name.contains('/') || path::canonical(Path::new(&name)).is_err() {
            return Err(VfsError::InvalidPath(name));
        }
        let replaced = self.mounts.insert(name.clone(), fsys).is_some();
        info!(mount = %name, replaced, "mounted filesystem");
        Ok(())
    }

    /// Drop the registration for `name`
    pub fn unmount(&self, name: &str) -> VfsResult<()> {
        if self.mounts.remove(name).is_none() {
            return Err(VfsError::mount_not_found(name));
        }
        info!(mount = %name, "unmounted filesystem");
        Ok(())
    }

    /// Mount names in sorted order
    pub fn mount_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mounts.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn resolve(&self, name: &str) -> VfsResult<Resolved> {
        let (mount, sub) = path::split_first(name);
        let fsys = self
            .mounts
            .get(mount)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| VfsError::mount_not_found(mount))?;
        Ok(Resolved {
            fsys,
            mount: mount.to_string(),
            sub: sub.to_string(),
        })
    }
}

impl Default for MountFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs for MountFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Box::new(MountRootDir { fs: self.clone() }));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            // The sub-filesystem's root identity is hidden behind the
            // mount name; iteration still goes to the wrapped handle.
            let inner = resolved.fsys.open(Path::new(path::ROOT))?;
            return Ok(Box::new(MountPointDir {
                inner,
                name: resolved.mount,
            }));
        }
        resolved.fsys.open(Path::new(&resolved.sub))
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Metadata::synthetic_dir(path::ROOT));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            return Ok(Metadata::synthetic_dir(resolved.mount));
        }
        resolved.fsys.stat(Path::new(&resolved.sub))
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(self
                .mount_names()
                .into_iter()
                .map(|n| DirEntry::new(n, FileType::Directory))
                .collect());
        }

        let resolved = self.resolve(&name)?;
        resolved.fsys.read_dir(Path::new(&resolved.sub))
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Err(VfsError::IsADirectory(name));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            return Err(VfsError::IsADirectory(resolved.mount));
        }
        resolved.fsys.read_file(Path::new(&resolved.sub))
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Arc::new(self.clone()));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            return Ok(resolved.fsys);
        }
        resolved.fsys.sub(Path::new(&resolved.sub))
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        ops::glob_walk(self, pattern)
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

impl WriteFs for MountFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let name = path::canonical(name)?;

        if name == path::ROOT {
            root_write_outcome(&name, flags, mode)?;
            return Ok(Some(self.open(Path::new(&name))?));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            root_write_outcome(&resolved.mount, flags, mode)?;
            return Ok(Some(self.open(Path::new(&name))?));
        }
        ops::open_file(&*resolved.fsys, Path::new(&resolved.sub), flags, mode)
    }
}

impl MkDirFs for MountFs {
    fn make_dir(&self, name: &Path, mode: Permissions) -> VfsResult<()> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Err(VfsError::AlreadyExists(name));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            return Err(VfsError::AlreadyExists(resolved.mount));
        }
        ops::make_dir(&*resolved.fsys, Path::new(&resolved.sub), mode)
    }
}

impl RemoveFs for MountFs {
    fn remove(&self, name: &Path) -> VfsResult<()> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Err(VfsError::unsupported("cannot remove the virtual root"));
        }

        let resolved = self.resolve(&name)?;
        if resolved.sub == path::ROOT {
            return Err(VfsError::unsupported("cannot remove a mount root"));
        }
        ops::remove(&*resolved.fsys, Path::new(&resolved.sub))
    }
}

/// Write requests addressed at the virtual root or a mount root:
/// directory creation finds the target already present, read-only opens
/// pass through, everything else is a write on a directory.
fn root_write_outcome(name: &str, flags: OpenFlags, mode: OpenMode) -> VfsResult<()> {
    if flags.is_read_only() {
        return Ok(());
    }
    if flags.create && mode.directory {
        return Err(VfsError::AlreadyExists(name.to_string()));
    }
    if flags.is_remove() {
        return Err(VfsError::unsupported("cannot remove a mount root"));
    }
    Err(VfsError::IsADirectory(name.to_string()))
}

/// Synthetic handle for the virtual root; the listing is recomputed
/// from the live table on every call
struct MountRootDir {
    fs: MountFs,
}

impl FileHandle for MountRootDir {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        Ok(Metadata::synthetic_dir(path::ROOT))
    }

    fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(path::ROOT.to_string()))
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::read_only_handle())
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        Ok(self
            .fs
            .mount_names()
            .into_iter()
            .map(|n| DirEntry::new(n, FileType::Directory))
            .collect())
    }
}

/// Identity-rewriting wrapper for a mount's root handle
struct MountPointDir {
    inner: Box<dyn FileHandle>,
    name: String,
}

impl FileHandle for MountPointDir {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        let mut md = self.inner.metadata()?;
        md.name = self.name.clone();
        Ok(md)
    }

    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.inner.write(buf)
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        self.inner.entries()
    }
}
