/*!
 * LocalFs Tests
 * Conformance run and adapter-boundary checks against a temp directory
 */

use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use virtfs::{conformance, ops, LocalFs, OpenFlags, OpenMode, Permissions, Vfs, VfsError};

#[test]
fn test_localfs_passes_conformance() {
    let temp = TempDir::new().unwrap();
    conformance::test_fs(&LocalFs::new(temp.path()));
}

#[test]
fn test_native_error_translation() {
    let temp = TempDir::new().unwrap();
    let fsys = LocalFs::new(temp.path());

    assert!(matches!(
        fsys.read_file(Path::new("missing")),
        Err(VfsError::NotFound(_))
    ));

    ops::make_dir(&fsys, Path::new("d"), Permissions::dir_default()).unwrap();
    assert!(matches!(
        fsys.read_file(Path::new("d")),
        Err(VfsError::IsADirectory(_))
    ));
    assert!(matches!(
        ops::make_dir(&fsys, Path::new("d"), Permissions::dir_default()),
        Err(VfsError::AlreadyExists(_))
    ));

    ops::write_file(&fsys, Path::new("d/f"), b"x").unwrap();
    let err = ops::remove(&fsys, Path::new("d")).unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
}

#[test]
fn test_dispatch_prefers_fast_paths() {
    let temp = TempDir::new().unwrap();
    let fsys = LocalFs::new(temp.path());

    // The derived operations route through the native fast paths and
    // agree with the flag-engine emulation used elsewhere.
    assert!(fsys.as_mkdir_fs().is_some());
    assert!(fsys.as_remove_fs().is_some());

    ops::make_dir(&fsys, Path::new("viafast"), Permissions::dir_default()).unwrap();
    assert!(fsys.stat(Path::new("viafast")).unwrap().is_dir());
    ops::remove(&fsys, Path::new("viafast")).unwrap();
    assert!(matches!(
        fsys.stat(Path::new("viafast")),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_exclusive_create_maps_native_error() {
    let temp = TempDir::new().unwrap();
    let fsys = LocalFs::new(temp.path());
    ops::write_file(&fsys, Path::new("f"), b"x").unwrap();

    let err = ops::open_file(
        &fsys,
        Path::new("f"),
        OpenFlags::write_only().with_create().with_exclusive(),
        OpenMode::default(),
    )
    .err().unwrap();
    assert!(matches!(err, VfsError::AlreadyExists(_)));
}

#[test]
fn test_sub_confines_to_directory() {
    let temp = TempDir::new().unwrap();
    let fsys = LocalFs::new(temp.path());
    ops::make_dir(&fsys, Path::new("inner"), Permissions::dir_default()).unwrap();
    ops::write_file(&fsys, Path::new("inner/f"), b"scoped").unwrap();
    ops::write_file(&fsys, Path::new("outer"), b"outside").unwrap();

    let sub = fsys.sub(Path::new("inner")).unwrap();
    assert_eq!(sub.read_file(Path::new("f")).unwrap(), b"scoped");
    assert!(matches!(
        sub.read_file(Path::new("outer")),
        Err(VfsError::NotFound(_))
    ));
    // The escape is rejected as a malformed path, not resolved.
    assert!(matches!(
        sub.read_file(Path::new("../outer")),
        Err(VfsError::InvalidPath(_))
    ));
}

#[test]
fn test_glob_walks_tree() {
    let temp = TempDir::new().unwrap();
    let fsys = LocalFs::new(temp.path());
    ops::make_dir(&fsys, Path::new("logs"), Permissions::dir_default()).unwrap();
    ops::write_file(&fsys, Path::new("logs/a.log"), b"x").unwrap();
    ops::write_file(&fsys, Path::new("logs/b.txt"), b"x").unwrap();
    ops::write_file(&fsys, Path::new("root.log"), b"x").unwrap();

    assert_eq!(fsys.glob("logs/*.log").unwrap(), ["logs/a.log"]);
    assert_eq!(fsys.glob("*.log").unwrap(), ["root.log"]);
}
