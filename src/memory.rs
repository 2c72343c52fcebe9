/*!
 * In-Memory Reference Backend
 * Canonical implementation of the contract over a flat entry table
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use super::ops::SubFs;
use super::path;
use super::traits::{FileHandle, Vfs, WriteFs};
use super::types::*;

/// Stored entry: a file's shared bytes or a directory marker
#[derive(Debug, Clone)]
enum NodeKind {
    File(Arc<RwLock<Vec<u8>>>),
    Directory,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    mode: Permissions,
    modified: SystemTime,
}

impl Node {
    fn directory(mode: Permissions) -> Self {
        Self {
            kind: NodeKind::Directory,
            mode,
            modified: SystemTime::now(),
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    fn file_type(&self) -> FileType {
        match self.kind {
            NodeKind::File(_) => FileType::File,
            NodeKind::Directory => FileType::Directory,
        }
    }

    fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File(data) => data.read().len() as u64,
            NodeKind::Directory => 0,
        }
    }
}

/// In-memory filesystem
///
/// Entries live in a flat map keyed by canonical path; directory
/// membership is inferred from path prefixes, not child lists. This
/// backend is the reference for the open-flag semantics: every other
/// implementation must agree with it.
///
/// File bytes are shared between the table and open handles, so an
/// entry's contents outlive its removal for as long as a handle holds
/// them. Individual accesses are synchronized, compound operations are
/// not; wrap in [`SyncFs`](crate::sync::SyncFs) for total ordering.
#[derive(Debug, Clone)]
pub struct MemFs {
    nodes: Arc<DashMap<String, Node, RandomState>>,
    created: SystemTime,
}

impl MemFs {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::with_hasher(RandomState::new())),
            created: SystemTime::now(),
        }
    }

    fn node_metadata(&self, name: &str) -> VfsResult<Metadata> {
        if name == path::ROOT {
            return Ok(Metadata {
                name: path::ROOT.to_string(),
                file_type: FileType::Directory,
                size: 0,
                permissions: Permissions::dir_default(),
                modified: self.created,
            });
        }
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| VfsError::NotFound(name.to_string()))?;
        Ok(Metadata {
            name: path::base(name).to_string(),
            file_type: node.file_type(),
            size: node.size(),
            permissions: node.mode,
            modified: node.modified,
        })
    }

    fn has_children(&self, name: &str) -> bool {
        self.nodes.iter().any(|e| path::parent(e.key()) == name)
    }

    fn touch(&self, name: &str) {
        if let Some(mut node) = self.nodes.get_mut(name) {
            node.modified = SystemTime::now();
        }
    }

    /// Immediate parent must exist as a directory for a file create
    fn check_parent(&self, name: &str) -> VfsResult<()> {
        let parent = path::parent(name);
        if parent == path::ROOT {
            return Ok(());
        }
        match self.nodes.get(parent) {
            None => Err(VfsError::NotFound(format!("parent directory {}", parent))),
            Some(node) if !node.is_dir() => Err(VfsError::InvalidArgument(format!(
                "parent directory '{}' is a file",
                parent
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Every ancestor must exist as a directory for a directory create
    fn check_parent_chain(&self, name: &str) -> VfsResult<()> {
        let mut current = String::from(path::ROOT);
        let segments: Vec<&str> = name.split('/').collect();
        for segment in &segments[..segments.len() - 1] {
            current = path::join(&current, segment);
            match self.nodes.get(current.as_str()) {
                Some(node) if node.is_dir() => {}
                _ => return Err(VfsError::NotFound(current)),
            }
        }
        Ok(())
    }

    fn remove_entry(&self, name: &str) -> VfsResult<()> {
        let is_dir = match self.nodes.get(name) {
            None => return Err(VfsError::NotFound(name.to_string())),
            Some(node) => node.is_dir(),
        };
        if is_dir && self.has_children(name) {
            return Err(VfsError::not_empty(name));
        }
        self.nodes.remove(name);
        Ok(())
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs for MemFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Box::new(MemDir {
                fs: self.clone(),
                name,
            }));
        }
        let node = self
            .nodes
            .get(&name)
            .map(|n| n.value().clone())
            .ok_or_else(|| VfsError::NotFound(name.clone()))?;
        match node.kind {
            NodeKind::Directory => Ok(Box::new(MemDir {
                fs: self.clone(),
                name,
            })),
            NodeKind::File(data) => Ok(Box::new(MemFile {
                fs: self.clone(),
                name,
                data,
                cursor: 0,
                writable: false,
            })),
        }
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let name = path::canonical(name)?;
        self.node_metadata(&name)
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let name = path::canonical(name)?;
        if name != path::ROOT {
            let node = self
                .nodes
                .get(&name)
                .ok_or_else(|| VfsError::NotFound(name.clone()))?;
            if !node.is_dir() {
                return Err(VfsError::NotADirectory(name.clone()));
            }
        }

        let mut entries: Vec<DirEntry> = self
            .nodes
            .iter()
            .filter(|e| path::parent(e.key()) == name)
            .map(|e| DirEntry::new(path::base(e.key()), e.value().file_type()))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Err(VfsError::IsADirectory(name));
        }
        let node = self
            .nodes
            .get(&name)
            .ok_or_else(|| VfsError::NotFound(name.clone()))?;
        match &node.kind {
            NodeKind::File(data) => Ok(data.read().clone()),
            NodeKind::Directory => Err(VfsError::IsADirectory(name)),
        }
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Arc::new(self.clone()));
        }
        if !self.node_metadata(&name)?.is_dir() {
            return Err(VfsError::NotADirectory(name));
        }
        Ok(Arc::new(SubFs::new(Arc::new(self.clone()), name)))
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        let compiled = glob::Pattern::new(pattern)
            .map_err(|_| VfsError::InvalidPath(format!("bad pattern: {}", pattern)))?;
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut matched: Vec<String> = self
            .nodes
            .iter()
            .filter(|e| compiled.matches_with(e.key(), options))
            .map(|e| e.key().clone())
            .collect();
        matched.sort();
        Ok(matched)
    }

    fn as_write_fs(&self) -> Option<&dyn WriteFs> {
        Some(self)
    }
}

impl WriteFs for MemFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let name = path::canonical(name)?;

        if flags.is_read_only() {
            return Ok(Some(self.open(Path::new(&name))?));
        }

        // Directory creation: Create plus the directory marker.
        if flags.create && mode.directory {
            if name == path::ROOT || self.nodes.contains_key(&name) {
                return Err(VfsError::AlreadyExists(name));
            }
            self.check_parent_chain(&name)?;
            self.nodes.insert(name, Node::directory(mode.permissions));
            return Ok(None);
        }

        // Truncate alone is the removal request.
        if flags.is_remove() {
            if name == path::ROOT {
                return Err(VfsError::NotFound(name));
            }
            self.remove_entry(&name)?;
            return Ok(None);
        }

        // Remaining combinations open a file for writing; the root and
        // directory entries never qualify.
        if name == path::ROOT {
            return Err(VfsError::IsADirectory(name));
        }

        let existing = self.nodes.get(&name).map(|node| node.value().clone());
        let mut cursor = 0usize;
        let data = match existing {
            Some(node) => {
                let data = match node.kind {
                    NodeKind::Directory => return Err(VfsError::IsADirectory(name)),
                    NodeKind::File(data) => data,
                };
                if flags.truncate {
                    data.write().clear();
                    self.touch(&name);
                } else if flags.exclusive {
                    return Err(VfsError::AlreadyExists(name));
                } else if flags.append {
                    cursor = data.read().len();
                }
                data
            }
            None => {
                if !flags.create {
                    return Err(VfsError::NotFound(name));
                }
                self.check_parent(&name)?;
                let data = Arc::new(RwLock::new(Vec::new()));
                self.nodes.insert(
                    name.clone(),
                    Node {
                        kind: NodeKind::File(Arc::clone(&data)),
                        mode: mode.permissions,
                        modified: SystemTime::now(),
                    },
                );
                data
            }
        };

        Ok(Some(Box::new(MemFile {
            fs: self.clone(),
            name,
            data,
            cursor,
            writable: true,
        })))
    }
}

/// In-memory file handle
///
/// Shares its entry's bytes with the table; the bytes stay alive while
/// the handle does, even if the entry is removed.
struct MemFile {
    fs: MemFs,
    name: String,
    data: Arc<RwLock<Vec<u8>>>,
    cursor: usize,
    writable: bool,
}

impl FileHandle for MemFile {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        match self.fs.node_metadata(&self.name) {
            Ok(md) => Ok(md),
            // Entry removed while open: report from the shared bytes.
            Err(VfsError::NotFound(_)) => Ok(Metadata {
                name: path::base(&self.name).to_string(),
                file_type: FileType::File,
                size: self.data.read().len() as u64,
                permissions: Permissions::default(),
                modified: SystemTime::now(),
            }),
            Err(e) => Err(e),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let data = self.data.read();
        if self.cursor >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - self.cursor);
        buf[..n].copy_from_slice(&data[self.cursor..self.cursor + n]);
        drop(data);
        self.cursor += n;
        Ok(n)
    }

    /// Overwrite in place from the cursor, extending at the tail;
    /// bytes past the written range are preserved.
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.writable {
            return Err(VfsError::read_only_handle());
        }
        let n = buf.len();
        let end = self.cursor + n;
        {
            let mut data = self.data.write();
            if self.cursor >= data.len() {
                data.resize(self.cursor, 0);
                data.extend_from_slice(buf);
            } else if end <= data.len() {
                data[self.cursor..end].copy_from_slice(buf);
            } else {
                data.truncate(self.cursor);
                data.extend_from_slice(buf);
            }
        }
        self.cursor = end;
        self.fs.touch(&self.name);
        Ok(n)
    }
}

/// In-memory directory handle; listing is recomputed per call
struct MemDir {
    fs: MemFs,
    name: String,
}

impl FileHandle for MemDir {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        self.fs.node_metadata(&self.name)
    }

    fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(self.name.clone()))
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::read_only_handle())
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        self.fs.read_dir(Path::new(&self.name))
    }
}
