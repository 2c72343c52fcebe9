/*!
 * Shared Types
 * Error taxonomy, metadata, and open flags for all backends
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Filesystem operation result
pub type VfsResult<T> = Result<T, VfsError>;

/// Filesystem errors
///
/// Every backend surfaces failures through this taxonomy; adapters
/// translate native errors at their boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl VfsError {
    /// Removal of a directory that still has children
    pub fn not_empty(path: &str) -> Self {
        VfsError::InvalidArgument(format!("directory '{}' not empty", path))
    }

    /// Operation the backend cannot provide
    pub fn unsupported(what: &str) -> Self {
        VfsError::InvalidArgument(format!("unsupported: {}", what))
    }

    /// Write attempted through a read-only handle
    pub fn read_only_handle() -> Self {
        VfsError::InvalidArgument("file does not support write".to_string())
    }

    /// Resolution failure in the mount table
    pub fn mount_not_found(name: &str) -> Self {
        VfsError::NotFound(format!("mount not found: {}", name))
    }
}

/// File type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    pub fn is_dir(&self) -> bool {
        *self == FileType::Directory
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Directory => write!(f, "directory"),
        }
    }
}

/// File permissions (Unix-style mode bits, stored but not enforced)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub mode: u32,
}

impl Permissions {
    pub fn new(mode: u32) -> Self {
        Self { mode }
    }

    pub fn readonly() -> Self {
        Self { mode: 0o444 }
    }

    pub fn readwrite() -> Self {
        Self { mode: 0o644 }
    }

    pub fn dir_default() -> Self {
        Self { mode: 0o755 }
    }

    pub fn is_readonly(&self) -> bool {
        self.mode & 0o200 == 0
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::readwrite()
    }
}

/// File metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub permissions: Permissions,
    pub modified: SystemTime,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Manufactured directory metadata for roots the storage never records
    pub fn synthetic_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: 0,
            permissions: Permissions::new(0o555),
            modified: SystemTime::UNIX_EPOCH,
        }
    }
}

/// Directory listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// File open flags
///
/// All-false is a read-only open. The combination `truncate` alone
/// (no write, no create) is the removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
    pub exclusive: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self::default()
    }

    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Self::default()
        }
    }

    /// Flags used by the removal emulation: truncate alone
    pub fn remove() -> Self {
        Self {
            truncate: true,
            ..Self::default()
        }
    }

    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn with_exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        !self.write && !self.create && !self.truncate && !self.append && !self.exclusive
    }

    pub fn is_remove(&self) -> bool {
        self.truncate && !self.write && !self.create && !self.append && !self.exclusive
    }
}

/// File open mode: permission bits plus the directory marker
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenMode {
    pub permissions: Permissions,
    pub directory: bool,
}

impl OpenMode {
    pub fn new(mode: u32) -> Self {
        Self {
            permissions: Permissions::new(mode),
            directory: false,
        }
    }

    pub fn dir(mode: u32) -> Self {
        Self {
            permissions: Permissions::new(mode),
            directory: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_predicates() {
        assert!(OpenFlags::read_only().is_read_only());
        assert!(!OpenFlags::write_only().is_read_only());
        assert!(OpenFlags::remove().is_remove());
        assert!(!OpenFlags::write_only().with_truncate().is_remove());
        assert!(!OpenFlags::read_only().with_truncate().with_create().is_remove());
    }

    #[test]
    fn test_permissions() {
        assert!(Permissions::readonly().is_readonly());
        assert!(!Permissions::readwrite().is_readonly());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            VfsError::not_empty("dir1/adir").to_string(),
            "invalid argument: directory 'dir1/adir' not empty"
        );
        assert_eq!(
            VfsError::mount_not_found("unknown").to_string(),
            "not found: mount not found: unknown"
        );
    }

    #[test]
    fn test_synthetic_dir() {
        let md = Metadata::synthetic_dir("mem1");
        assert_eq!(md.name, "mem1");
        assert!(md.is_dir());
        assert_eq!(md.size, 0);
    }
}
