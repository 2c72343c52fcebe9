/*!
 * virtfs
 * Composable virtual filesystem: writable storage backends behind one
 * mount table
 *
 * The capability contract lives in [`traits`]; [`memory::MemFs`] is the
 * reference implementation of the open-flag semantics, [`mount::MountFs`]
 * composes named backends into one namespace, and [`conformance`] is the
 * battery any further backend must pass.
 */

pub mod conformance;
pub mod lazy;
pub mod local;
pub mod memory;
pub mod mount;
pub mod ops;
pub mod path;
#[cfg(feature = "ssh")]
pub mod remote;
pub mod sync;
pub mod traits;
pub mod types;

// Re-exports
pub use lazy::LazyFs;
pub use local::LocalFs;
pub use memory::MemFs;
pub use mount::MountFs;
pub use ops::{make_dir, open_file, remove, write_file};
#[cfg(feature = "ssh")]
pub use remote::{HostConfigStore, SshFs};
pub use sync::SyncFs;
pub use traits::{FileHandle, MkDirFs, RemoveFs, Vfs, WriteFs};
pub use types::{
    DirEntry, FileType, Metadata, OpenFlags, OpenMode, Permissions, VfsError, VfsResult,
};
