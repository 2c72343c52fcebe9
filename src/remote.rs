/*!
 * Remote Filesystem Backend
 * Maps the contract onto an SFTP channel over an SSH transport
 */

use parking_lot::Mutex;
use ssh2::{ErrorCode, OpenType, Session, Sftp};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::info;

use super::ops;
use super::path;
use super::traits::{FileHandle, Vfs, WriteFs};
use super::types::*;

/// Resolved connection parameters for one host alias
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity: PathBuf,
}

/// Host configuration, built once by the caller and passed into
/// connection constructors
///
/// Wraps a parsed ssh client configuration; there is no process-wide
/// cached lookup, a store is an ordinary value.
pub struct HostConfigStore {
    config: ssh2_config::SshConfig,
}

impl HostConfigStore {
    /// Load `~/.ssh/config`
    pub fn load() -> VfsResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| VfsError::NotFound("home directory".to_string()))?;
        let file = std::fs::File::open(home.join(".ssh").join("config"))
            .map_err(|e| VfsError::Io(format!("ssh config: {}", e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a configuration from any reader
    pub fn from_reader(mut reader: impl BufRead) -> VfsResult<Self> {
        let config = ssh2_config::SshConfig::default()
            .parse(&mut reader, ssh2_config::ParseRule::ALLOW_UNKNOWN_FIELDS)
            .map_err(|e| VfsError::InvalidArgument(format!("ssh config: {}", e)))?;
        Ok(Self { config })
    }

    /// Resolve an alias to connection parameters; the identity file is
    /// required since key authentication is the only supported method.
    pub fn lookup(&self, alias: &str) -> VfsResult<HostEntry> {
        let params = self.config.query(alias);

        let identity = params
            .identity_file
            .as_ref()
            .and_then(|files| files.first().cloned())
            .ok_or_else(|| {
                VfsError::InvalidArgument(format!("no identity file for host {}", alias))
            })?;
        let identity = expand_home(identity);

        Ok(HostEntry {
            host: params.host_name.clone().unwrap_or_else(|| alias.to_string()),
            port: params.port.unwrap_or(22),
            user: params.user.clone().ok_or_else(|| {
                VfsError::InvalidArgument(format!("no user for host {}", alias))
            })?,
            identity,
        })
    }
}

fn expand_home(p: PathBuf) -> PathBuf {
    if let Ok(rest) = p.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    p
}

struct Remote {
    sftp: Sftp,
    session: Session,
    owned: bool,
}

/// Remote filesystem over SFTP, confined to a root path
///
/// The SFTP channel is single-threaded, so every operation serializes
/// on an internal lock. Handles returned by open calls talk to the same
/// channel outside that lock; share a handle across threads only
/// behind your own synchronization.
#[derive(Clone)]
pub struct SshFs {
    remote: Arc<Mutex<Remote>>,
    root: String,
}

impl SshFs {
    /// Build on an already-connected session; `disconnect` will leave
    /// the transport itself open.
    pub fn connect_session(root: impl Into<String>, session: Session) -> VfsResult<Self> {
        let sftp = session.sftp().map_err(|e| VfsError::Io(e.to_string()))?;
        Ok(Self {
            remote: Arc::new(Mutex::new(Remote {
                sftp,
                session,
                owned: false,
            })),
            root: root.into(),
        })
    }

    /// Dial the host named by `alias` in the configuration store and
    /// authenticate with its identity key; `disconnect` tears the
    /// transport down.
    pub fn connect(
        root: impl Into<String>,
        alias: &str,
        store: &HostConfigStore,
    ) -> VfsResult<Self> {
        let entry = store.lookup(alias)?;

        let stream = TcpStream::connect((entry.host.as_str(), entry.port))
            .map_err(|e| VfsError::Io(format!("connect {}: {}", entry.host, e)))?;
        let mut session = Session::new().map_err(|e| VfsError::Io(e.to_string()))?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| VfsError::Io(format!("handshake {}: {}", entry.host, e)))?;
        session
            .userauth_pubkey_file(&entry.user, None, &entry.identity, None)
            .map_err(|e| VfsError::PermissionDenied(format!("auth {}: {}", entry.host, e)))?;

        info!(host = %entry.host, user = %entry.user, "connected remote filesystem");

        let sftp = session.sftp().map_err(|e| VfsError::Io(e.to_string()))?;
        Ok(Self {
            remote: Arc::new(Mutex::new(Remote {
                sftp,
                session,
                owned: true,
            })),
            root: root.into(),
        })
    }

    /// Close the SFTP channel and, when this instance dialed it, the
    /// SSH transport underneath.
    pub fn disconnect(&self) -> VfsResult<()> {
        let remote = self.remote.lock();
        if remote.owned {
            remote
                .session
                .disconnect(None, "closing", None)
                .map_err(|e| VfsError::Io(e.to_string()))?;
            info!("disconnected remote filesystem");
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> PathBuf {
        if name == path::ROOT {
            PathBuf::from(&self.root)
        } else {
            Path::new(&self.root).join(name)
        }
    }

    fn sftp_error(e: ssh2::Error, context: &str) -> VfsError {
        match e.code() {
            ErrorCode::SFTP(2) => VfsError::NotFound(context.to_string()),
            ErrorCode::SFTP(3) => VfsError::PermissionDenied(context.to_string()),
            ErrorCode::SFTP(11) => VfsError::AlreadyExists(context.to_string()),
            _ => VfsError::Io(format!("{}: {}", context, e)),
        }
    }

    fn stat_to_metadata(name: &str, st: &ssh2::FileStat) -> Metadata {
        Metadata {
            name: name.to_string(),
            file_type: if st.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            },
            size: st.size.unwrap_or(0),
            permissions: Permissions::new(st.perm.map(|p| p & 0o777).unwrap_or(0o644)),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(st.mtime.unwrap_or(0)),
        }
    }

    fn list(&self, name: &str) -> VfsResult<Vec<DirEntry>> {
        let remote = self.remote.lock();
        let listed = remote
            .sftp
            .readdir(&self.resolve(name))
            .map_err(|e| Self::sftp_error(e, name))?;

        let mut entries = Vec::new();
        for (entry_path, st) in listed {
            let entry_name = entry_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| VfsError::InvalidPath("non UTF-8 file name".to_string()))?
                .to_string();
            let file_type = if st.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };
            entries.push(DirEntry::new(entry_name, file_type));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

impl Vfs for SshFs {
    fn open(&self, name: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let name = path::canonical(name)?;
        let st = {
            let remote = self.remote.lock();
            remote
                .sftp
                .stat(&self.resolve(&name))
                .map_err(|e| Self::sftp_error(e, &name))?
        };

        if st.is_dir() {
            return Ok(Box::new(SshDir {
                fs: self.clone(),
                name,
            }));
        }

        let remote = self.remote.lock();
        let file = remote
            .sftp
            .open(&self.resolve(&name))
            .map_err(|e| Self::sftp_error(e, &name))?;
        Ok(Box::new(SshFile {
            file,
            name,
            writable: false,
        }))
    }

    fn stat(&self, name: &Path) -> VfsResult<Metadata> {
        let name = path::canonical(name)?;
        let remote = self.remote.lock();
        let st = remote
            .sftp
            .stat(&self.resolve(&name))
            .map_err(|e| Self::sftp_error(e, &name))?;
        Ok(Self::stat_to_metadata(path::base(&name), &st))
    }

    fn read_dir(&self, name: &Path) -> VfsResult<Vec<DirEntry>> {
        let name = path::canonical(name)?;
        self.list(&name)
    }

    fn read_file(&self, name: &Path) -> VfsResult<Vec<u8>> {
        let name = path::canonical(name)?;
        let remote = self.remote.lock();
        let mut file = remote
            .sftp
            .open(&self.resolve(&name))
            .map_err(|e| Self::sftp_error(e, &name))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| VfsError::Io(format!("{}: {}", name, e)))?;
        Ok(buf)
    }

    fn sub(&self, name: &Path) -> VfsResult<Arc<dyn Vfs>> {
        let name = path::canonical(name)?;
        if name == path::ROOT {
            return Ok(Arc::new(self.clone()));
        }
        if !self.stat(Path::new(&name))?.is_dir() {
            return Err(VfsError::NotADirectory(name));
        }
        Ok(Arc::new(SshFs {
            remote: Arc::clone(&self.remote),
            root: self.resolve(&name).to_string_lossy().into_owned(),
        }))
    }

    fn glob(&self, pattern: &str) -> VfsResult<Vec<String>> {
        ops::glob_walk(self, pattern)
    }

    fn as_write_fs(&self) -> Option<&dyn WriteFs> {
        Some(self)
    }
}

impl WriteFs for SshFs {
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: OpenMode,
    ) -> VfsResult<Option<Box<dyn FileHandle>>> {
        let name = path::canonical(name)?;
        let full = self.resolve(&name);

        if flags.create && mode.directory {
            let remote = self.remote.lock();
            if let Err(e) = remote.sftp.mkdir(&full, mode.permissions.mode as i32) {
                return Err(match remote.sftp.stat(&full) {
                    Ok(_) => VfsError::AlreadyExists(name),
                    Err(_) => Self::sftp_error(e, &name),
                });
            }
            return Ok(None);
        }

        if flags.is_remove() {
            let remote = self.remote.lock();
            let st = remote
                .sftp
                .stat(&full)
                .map_err(|e| Self::sftp_error(e, &name))?;
            if st.is_dir() {
                remote.sftp.rmdir(&full).map_err(|e| match e.code() {
                    // Servers report a non-empty directory as a generic failure.
                    ErrorCode::SFTP(4) => VfsError::not_empty(&name),
                    _ => Self::sftp_error(e, &name),
                })?;
            } else {
                remote
                    .sftp
                    .unlink(&full)
                    .map_err(|e| Self::sftp_error(e, &name))?;
            }
            return Ok(None);
        }

        if flags.is_read_only() {
            return Ok(Some(self.open(Path::new(&name))?));
        }

        let mut sftp_flags = ssh2::OpenFlags::WRITE;
        if flags.append {
            sftp_flags |= ssh2::OpenFlags::APPEND;
        }
        if flags.create {
            sftp_flags |= ssh2::OpenFlags::CREATE;
        }
        if flags.truncate {
            sftp_flags |= ssh2::OpenFlags::TRUNCATE;
        }
        if flags.exclusive {
            sftp_flags |= ssh2::OpenFlags::EXCLUSIVE;
        }

        let remote = self.remote.lock();
        let file = remote
            .sftp
            .open_mode(
                &full,
                sftp_flags,
                mode.permissions.mode as i32,
                OpenType::File,
            )
            .map_err(|e| Self::sftp_error(e, &name))?;

        Ok(Some(Box::new(SshFile {
            file,
            name,
            writable: true,
        })))
    }
}

/// Remote file handle over an open SFTP file
struct SshFile {
    file: ssh2::File,
    name: String,
    writable: bool,
}

impl FileHandle for SshFile {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        let st = self
            .file
            .stat()
            .map_err(|e| SshFs::sftp_error(e, &self.name))?;
        Ok(SshFs::stat_to_metadata(path::base(&self.name), &st))
    }

    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.file
            .read(buf)
            .map_err(|e| VfsError::Io(format!("{}: {}", self.name, e)))
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.writable {
            return Err(VfsError::read_only_handle());
        }
        self.file
            .write(buf)
            .map_err(|e| VfsError::Io(format!("{}: {}", self.name, e)))
    }

    fn sync(&mut self) -> VfsResult<()> {
        self.file
            .fsync()
            .map_err(|e| SshFs::sftp_error(e, &self.name))
    }
}

/// Remote directory handle; listing delegates to the channel
struct SshDir {
    fs: SshFs,
    name: String,
}

impl FileHandle for SshDir {
    fn metadata(&mut self) -> VfsResult<Metadata> {
        self.fs.stat(Path::new(&self.name))
    }

    fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(self.name.clone()))
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::read_only_handle())
    }

    fn entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        self.fs.list(&self.name)
    }
}
