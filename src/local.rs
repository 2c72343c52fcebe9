/*!
 * Local Filesystem Backend
 * Maps the contract onto std::fs, confined to a root path
 */

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::ops;
use super::path;
use super::traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
use super::types::*;

/// Local filesystem rooted at a host directory
///
/// Paths are validated with the shared rules before resolution, so a
/// resolved path can never name anything outside the root. Native
/// errors are translated into the taxonomy at this boundary.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create a local filesystem confined to `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        if name == path::ROOT {
            self.root.clone()
        } else {
            self.root.join(name)
        }
    }

    /// Convert std::io::Error to the shared taxonomy
    fn io_error(e: std::io::Error, context: &str) -> VfsError {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => VfsError::NotFound(context.to_string()),
            ErrorKind::PermissionDenied => VfsError::PermissionDenied(context.to_string()),
            ErrorKind::AlreadyExists => VfsError::AlreadyExists(context.to_string()),
            ErrorKind::IsADirectory => VfsError::IsADirectory(context.to_string()),
            ErrorKind::NotADirectory => VfsError::NotADirectory(context.to_string()),
            ErrorKind::DirectoryNotEmpty => VfsError::not_empty(context),
            ErrorKind::InvalidInput => VfsError::InvalidArgument(context.to_string()),
            _ => VfsError::Io(format!("{}: {}", context, e)),
        }
    }

    fn convert_metadata(name: &str, md: &fs::Metadata) -> Metadata {
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            md.permissions().mode() & 0o777
        };
        #[cfg(not(unix))]
        let mode = if md.permissions().readonly() {
            0o444
        } else {
            0o644
        };

        Metadata {
            name: name.to_string(),
            file_type: if md.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            },
            size: md.len(),
            permissions: Permissions::new(mode),
            modified: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    /// Single-level native directory creation
    fn create_dir_native(&self, name: &str, perms: Permissions) -> VfsResult<()> {
        let full = self.resolve(name);
        fs::create_dir(&full).map_err(|e| Self::io_error(e, name))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full, fs::Permissions::from_mode(perms.mode))
                .map_err(|e| Self::io_error(e, name))?;
        }
        #[cfg(not(unix))]
        let _ = perms;

        Ok(())
    }

    /// Native removal of a file or an empty directory
    fn remove_native(&self, name: &str) -> VfsResult<()> {
        let full = self.resolve(name);
        let md = fs::metadata(&full).map_err(|e| Self::io_error(e, name))?;
        if md.is_dir() {
            fs::remove_dir(&full).map_err(|e| Self::io_error(e, name))
        } else {
            fs::remove_file(&full).map_err(|e| Self::io_error(e, name))
        }
    }
}

impl Vfs for LocalFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let name = path::canonical(name)?;
        let full = self.resolve(&name);
        let md = fs::metadata(&full).map_err(|e| Self::io_error(e, &name))?;

        if md.is_dir() {
            Ok(Box::new(LocalDir {
                resolved: full,
                name,
            }))
        } else {
            let file = fs::File::open(&full).map_err(|e| Self::io_error(e, &name))?;
            Ok(Box::new(LocalFile {
                file,
                name,
                writable: false,
            }))
        }
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let name = path::canonical(name)?;
        let md = fs::metadata(self.resolve(&name)).map_err(|e| Self::io_error(e, &name))?;
        Ok(Self::convert_metadata(path::base(&name), &md))
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let name = path::canonical(name)?;
        let iter = fs::read_dir(self.resolve(&name)).map_err(|e| Self::io_error(e, &name))?;

        let mut entries = Vec::new();
        for entry in iter {
            let entry = entry.map_err(|e| Self::io_error(e, &name))?;
            let entry_name = entry
                .file_name()
                .into_string()
                .map_err(|_| VfsError::InvalidPath("non UTF-8 file name".to_string()))?;
            let file_type = entry.file_type().map_err(|e| Self::io_error(e, &name))?;
            entries.push(DirEntry::new(
                entry_name,
                if file_type.is_dir() {
                    FileType::Directory
                } else {
                    FileType::File
                },
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let name = path::canonical(name)?;
        let full = self.resolve(&name);
        let md = fs::metadata(&full).map_err(|e| Self::io_error(e, &name))?;
        if md.is_dir() {
            return Err(VfsError::IsADirectory(name));
        }
        fs::read(&full).map_err(|e| Self::io_error(e, &name))
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let name = path::canonical(name)?;
        let full = self.resolve(&name);
        let md = fs::metadata(&full).map_err(|e| Self::io_error(e, &name))?;
        if !md.is_dir() {
            return Err(VfsError::NotADirectory(name));
        }
        Ok(Arc::new(LocalFs::new(full)))
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

impl WriteFs for LocalFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let name = path::canonical(name)?;

        if flags.create && mode.directory {
            self.create_dir_native(&name, mode.permissions)?;
            return Ok(None);
        }

        if flags.is_remove() {
            self.remove_native(&name)?;
            return Ok(None);
        }

        if flags.is_read_only() {
            return Ok(Some(self.open(Path::new(&name))?));
        }

        let mut options = fs::OpenOptions::new();
        options
            .write(true)
            .append(flags.append)
            .truncate(flags.truncate)
            .create(flags.create)
            .create_new(flags.exclusive);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode.permissions.mode);
        }

        let file = options
            .open(self.resolve(&name))
            .map_err(|e| Self::io_error(e, &name))?;

        Ok(Some(Box::new(LocalFile {
            file,
            name,
            writable: true,
        })))
    }
}

impl MkDirFs for LocalFs {
    fn make_dir(&self, name: &Path, mode: Permissions) -> VfsResult<()> {
        let name = path::canonical(name)?;
        self.create_dir_native(&name, mode)
    }
}

impl RemoveFs for LocalFs {
    fn remove(&self, name: &Path) -> VfsResult<()> {
        let name = path::canonical(name)?;
        self.remove_native(&name)
    }
}

/// Native file handle; closing flushes the descriptor
struct LocalFile {
    file: fs::File,
    name: String,
    writable: bool,
}

impl FileHandle for LocalFile {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        let md = self
            .file
            .metadata()
            .map_err(|e| LocalFs::io_error(e, &self.name))?;
        Ok(LocalFs::convert_metadata(path::base(&self.name), &md))
    }

    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.file
            .read(buf)
            .map_err(|e| LocalFs::io_error(e, &self.name))
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.writable {
            return Err(VfsError::read_only_handle());
        }
        self.file
            .write(buf)
            .map_err(|e| LocalFs::io_error(e, &self.name))
    }

    fn sync(&mut self) -> VfsResult<()> {
        self.file
            .sync_all()
            .map_err(|e| LocalFs::io_error(e, &self.name))
    }
}

/// Native directory handle
struct LocalDir {
    resolved: PathBuf,
    name: String,
}

impl FileHandle for LocalDir {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        let md = fs::metadata(&self.resolved).map_err(|e| LocalFs::io_error(e, &self.name))?;
        Ok(LocalFs::convert_metadata(path::base(&self.name), &md))
    }

    fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(self.name.clone()))
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::read_only_handle())
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        let iter =
            fs::read_dir(&self.resolved).map_err(|e| LocalFs::io_error(e, &self.name))?;
        let mut entries = Vec::new();
        for entry in iter {
            let entry = entry.map_err(|e| LocalFs::io_error(e, &self.name))?;
            let entry_name = entry
                .file_name()
                .into_string()
                .map_err(|_| VfsError::InvalidPath("non UTF-8 file name".to_string()))?;
            let file_type = entry
                .file_type()
                .map_err(|e| LocalFs::io_error(e, &self.name))?;
            entries.push(DirEntry::new(
                entry_name,
                if file_type.is_dir() {
                    FileType::Directory
                } else {
                    FileType::File
                },
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
