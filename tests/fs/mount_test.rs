/*!
 * MountFs Tests
 * Composition, identity rewriting, and conformance over mounted backends
 */

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use virtfs::{
    conformance, ops, FileType, LocalFs, MemFs, MountFs, Permissions, Vfs, VfsError,
};

fn data_backend(seed: &[(&str, &[u8])]) -> Arc<MemFs> {
    let fsys = MemFs::new();
    for (file, content) in seed {
        if let Some(slash) = file.rfind('/') {
            let mut current = String::new();
            for segment in file[..slash].split('/') {
                current = if current.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}/{}", current, segment)
                };
                match ops::make_dir(&fsys, Path::new(&current), Permissions::dir_default()) {
                    Ok(()) | Err(VfsError::AlreadyExists(_)) => {}
                    Err(e) => panic!("seed {}: {}", current, e),
                }
            }
        }
        ops::write_file(&fsys, Path::new(file), content).unwrap();
    }
    Arc::new(fsys)
}

#[test]
fn test_mountfs_passes_conformance() {
    crate::init_logging();

    // The fixture's top-level directories are pre-registered mounts;
    // everything below them delegates into the backends.
    let mfs = MountFs::new();
    mfs.mount("dir1", Arc::new(MemFs::new())).unwrap();
    mfs.mount("dirempty", Arc::new(MemFs::new())).unwrap();
    conformance::test_fs(&mfs);
}

#[test]
fn test_identity_rewrite() {
    let mfs = MountFs::new();
    mfs.mount("mem1", data_backend(&[("adir/afile", b"data")]))
        .unwrap();

    let md = mfs.stat(Path::new("mem1")).unwrap();
    assert_eq!(md.name, "mem1");
    assert_eq!(md.file_type, FileType::Directory);

    let md = mfs.stat(Path::new(".")).unwrap();
    assert_eq!(md.name, ".");
    assert!(md.is_dir());

    // An open mount root reports the mount name but iterates the
    // backend's own entries.
    let mut handle = mfs.open(Path::new("mem1")).unwrap();
    assert_eq!(handle.metadata().unwrap().name, "mem1");
    let names: Vec<String> = handle
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["adir"]);

    // Below the root the sub-filesystem's identity is untouched.
    assert_eq!(mfs.stat(Path::new("mem1/adir")).unwrap().name, "adir");
}

#[test]
fn test_unknown_mount_is_distinguishable() {
    let mfs = MountFs::new();
    mfs.mount("known", Arc::new(MemFs::new())).unwrap();

    let err = mfs.read_file(Path::new("unknown/x")).unwrap_err();
    assert_eq!(err, VfsError::mount_not_found("unknown"));
    assert!(err.to_string().contains("mount not found: unknown"));

    assert!(matches!(
        mfs.stat(Path::new("unknown")),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_virtual_root_listing() {
    let mfs = MountFs::new();
    mfs.mount("zeta", Arc::new(MemFs::new())).unwrap();
    mfs.mount("alpha", Arc::new(MemFs::new())).unwrap();
    mfs.mount("mid", Arc::new(MemFs::new())).unwrap();

    let names: Vec<String> = mfs
        .read_dir(Path::new("."))
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
    assert!(mfs
        .read_dir(Path::new("."))
        .unwrap()
        .iter()
        .all(|e| e.file_type == FileType::Directory));

    // The synthetic root listing tracks the live table.
    let mut root = mfs.open(Path::new(".")).unwrap();
    mfs.unmount("mid").unwrap();
    let names: Vec<String> = root
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["alpha", "zeta"]);
}

#[test]
fn test_heterogeneous_mounts_stay_isolated() {
    let temp = TempDir::new().unwrap();
    let mfs = MountFs::new();
    mfs.mount("mem", Arc::new(MemFs::new())).unwrap();
    mfs.mount("disk", Arc::new(LocalFs::new(temp.path()))).unwrap();

    ops::write_file(&mfs, Path::new("mem/a"), b"volatile").unwrap();
    ops::write_file(&mfs, Path::new("disk/b"), b"durable").unwrap();

    assert_eq!(mfs.read_file(Path::new("mem/a")).unwrap(), b"volatile");
    assert_eq!(mfs.read_file(Path::new("disk/b")).unwrap(), b"durable");
    assert!(matches!(
        mfs.read_file(Path::new("mem/b")),
        Err(VfsError::NotFound(_))
    ));
    assert!(matches!(
        mfs.read_file(Path::new("disk/a")),
        Err(VfsError::NotFound(_))
    ));

    // The file written through the mount layer really is on disk.
    assert_eq!(std::fs::read(temp.path().join("b")).unwrap(), b"durable");
}

#[test]
fn test_last_registration_wins() {
    let mfs = MountFs::new();
    mfs.mount("m", data_backend(&[("old", b"old")])).unwrap();
    mfs.mount("m", data_backend(&[("new", b"new")])).unwrap();

    assert_eq!(mfs.read_file(Path::new("m/new")).unwrap(), b"new");
    assert!(matches!(
        mfs.read_file(Path::new("m/old")),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_sub_levels() {
    let mfs = MountFs::new();
    let backend = data_backend(&[("adir/afile", b"data")]);
    mfs.mount("m", backend).unwrap();

    // Root resolves to the table itself.
    let table = mfs.sub(Path::new(".")).unwrap();
    assert_eq!(table.stat(Path::new("m")).unwrap().name, "m");

    // A bare mount name resolves to the backend.
    let backend_view = mfs.sub(Path::new("m")).unwrap();
    assert_eq!(backend_view.stat(Path::new("adir")).unwrap().name, "adir");

    // Deeper paths delegate to the backend's own view.
    let inner = mfs.sub(Path::new("m/adir")).unwrap();
    assert_eq!(inner.read_file(Path::new("afile")).unwrap(), b"data");
}

#[test]
fn test_write_requests_on_roots() {
    let mfs = MountFs::new();
    mfs.mount("m", Arc::new(MemFs::new())).unwrap();

    assert!(matches!(
        ops::make_dir(&mfs, Path::new("m"), Permissions::dir_default()),
        Err(VfsError::AlreadyExists(_))
    ));
    assert!(matches!(
        ops::make_dir(&mfs, Path::new("."), Permissions::dir_default()),
        Err(VfsError::AlreadyExists(_))
    ));
    assert!(matches!(
        ops::remove(&mfs, Path::new("m")),
        Err(VfsError::InvalidArgument(_))
    ));
    assert!(matches!(
        ops::write_file(&mfs, Path::new("m"), b"x"),
        Err(VfsError::IsADirectory(_))
    ));
}
