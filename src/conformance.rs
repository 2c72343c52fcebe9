/*!
 * Conformance Suite
 * Backend-agnostic battery every contract implementation must pass
 */

use std::path::Path;
use std::time::{Duration, SystemTime};

use super::ops;
use super::traits::Vfs;
use super::types::*;

const DIRS: [&str; 3] = ["dir1", "dir1/dirsub1", "dirempty"];
const FILES: [&str; 3] = ["dir1/file1", "dir1/file2", "dir1/dirsub1/file3"];

/// Run the full behavioral battery against a backend.
///
/// Seeds a fixture tree through the contract's own write operations,
/// verifies read parity against it, exercises every flag combination of
/// the open engine, and asserts the exact error class on each boundary
/// case. Panics on the first violation, so a backend is compliant only
/// when this returns.
///
/// Fixture paths already present are tolerated, which lets the battery
/// run against a mount table whose mounts carry the fixture names.
pub fn test_fs(fsys: &dyn Vfs) {
    seed_fixture(fsys);
    check_read_parity(fsys);
    check_dir_create(fsys);
    check_bad_paths(fsys);
    check_file_remove(fsys);
    check_dir_remove(fsys);
    check_create_write(fsys);
    check_overwrite(fsys);
    check_truncate(fsys);
    check_append(fsys);
    check_open_errors(fsys);
    check_read_only_handle(fsys);
}

fn content_of(name: &str) -> Vec<u8> {
    format!("{} content\n", name).into_bytes()
}

fn assert_dir(fsys: &dyn Vfs, name: &str) {
    let md = fsys
        .stat(Path::new(name))
        .unwrap_or_else(|e| panic!("stat {}: {}", name, e));
    assert!(md.is_dir(), "{} should be a directory", name);
}

fn assert_file(fsys: &dyn Vfs, name: &str) {
    let md = fsys
        .stat(Path::new(name))
        .unwrap_or_else(|e| panic!("stat {}: {}", name, e));
    assert!(md.is_file(), "{} should be a file", name);
}

fn assert_missing(fsys: &dyn Vfs, name: &str) {
    assert!(
        matches!(fsys.stat(Path::new(name)), Err(VfsError::NotFound(_))),
        "{} should not exist",
        name
    );
}

fn assert_fresh(md: &Metadata, name: &str) {
    let age = SystemTime::now()
        .duration_since(md.modified)
        .unwrap_or_default();
    assert!(
        age < Duration::from_secs(2),
        "{} modification time should be close to now, was {:?} ago",
        name,
        age
    );
}

fn remove_tolerant(fsys: &dyn Vfs, name: &str) {
    match ops::remove(fsys, Path::new(name)) {
        Ok(()) | Err(VfsError::NotFound(_)) => {}
        Err(e) => panic!("remove {}: {}", name, e),
    }
}

fn seed_fixture(fsys: &dyn Vfs) {
    for dir in DIRS {
        match ops::make_dir(fsys, Path::new(dir), Permissions::dir_default()) {
            Ok(()) | Err(VfsError::AlreadyExists(_)) => {}
            Err(e) => panic!("make_dir {}: {}", dir, e),
        }
    }
    for file in FILES {
        let content = content_of(file);
        let n = ops::write_file(fsys, Path::new(file), &content)
            .unwrap_or_else(|e| panic!("write_file {}: {}", file, e));
        assert_eq!(n, content.len(), "short write seeding {}", file);
    }
}

fn check_read_parity(fsys: &dyn Vfs) {
    let root = fsys.stat(Path::new(".")).unwrap();
    assert_eq!(root.name, ".");
    assert!(root.is_dir());

    for dir in DIRS {
        assert_dir(fsys, dir);
        let md = fsys.stat(Path::new(dir)).unwrap();
        assert_eq!(md.name, dir.rsplit('/').next().unwrap());
    }

    for file in FILES {
        assert_file(fsys, file);
        assert_eq!(
            fsys.read_file(Path::new(file)).unwrap(),
            content_of(file),
            "content mismatch for {}",
            file
        );

        let mut handle = fsys.open(Path::new(file)).unwrap();
        assert_eq!(handle.read_to_end().unwrap(), content_of(file));
    }

    // Directory listings are sorted and match between the filesystem
    // view and an open directory handle.
    let listed: Vec<String> = fsys
        .read_dir(Path::new("dir1"))
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(listed, ["dirsub1", "file1", "file2"]);

    let mut dir_handle = fsys.open(Path::new("dir1")).unwrap();
    let from_handle: Vec<String> = dir_handle
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(from_handle, listed);

    let top: Vec<String> = fsys
        .read_dir(Path::new("."))
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert!(top.contains(&"dir1".to_string()));
    assert!(top.contains(&"dirempty".to_string()));
    let mut sorted = top.clone();
    sorted.sort();
    assert_eq!(top, sorted, "root listing should be sorted");
}

fn check_dir_create(fsys: &dyn Vfs) {
    remove_tolerant(fsys, "dir1/adir/nested");
    remove_tolerant(fsys, "dir1/adir");

    // Creation is never recursive.
    let err = ops::open_file(
        fsys,
        Path::new("dir1/adir/nested"),
        OpenFlags::read_only().with_create(),
        OpenMode::dir(0o755),
    )
    .err().unwrap();
    assert!(
        matches!(err, VfsError::NotFound(_)),
        "nested create in a missing parent should fail NotFound, got {}",
        err
    );

    for dir in ["dir1/adir", "dir1/adir/nested"] {
        let outcome = ops::open_file(
            fsys,
            Path::new(dir),
            OpenFlags::read_only().with_create(),
            OpenMode::dir(0o755),
        )
        .unwrap_or_else(|e| panic!("create dir {}: {}", dir, e));
        assert!(outcome.is_none(), "directory creation returns no handle");
        assert_dir(fsys, dir);
    }
}

fn check_bad_paths(fsys: &dyn Vfs) {
    for bad in [
        "/dir1",
        "dir1/",
        "dir1//file1",
        "dir1/./file1",
        "dir1/../file1",
        "dir1\\file1",
        "",
    ] {
        let err = ops::open_file(
            fsys,
            Path::new(bad),
            OpenFlags::read_only(),
            OpenMode::default(),
        )
        .err().unwrap();
        assert!(
            matches!(err, VfsError::InvalidPath(_)),
            "{:?} should be rejected as a malformed path, got {}",
            bad,
            err
        );
    }
}

fn check_file_remove(fsys: &dyn Vfs) {
    let file = "dir1/somenewfile";
    ops::write_file(fsys, Path::new(file), b"transient").unwrap();
    assert_file(fsys, file);

    let outcome = ops::open_file(
        fsys,
        Path::new(file),
        OpenFlags::remove(),
        OpenMode::default(),
    )
    .unwrap();
    assert!(outcome.is_none(), "removal returns no handle");
    assert_missing(fsys, file);
}

fn check_dir_remove(fsys: &dyn Vfs) {
    // dir1/adir still holds dir1/adir/nested from check_dir_create.
    let err = ops::open_file(
        fsys,
        Path::new("dir1/adir"),
        OpenFlags::remove(),
        OpenMode::default(),
    )
    .err().unwrap();
    assert!(
        matches!(err, VfsError::InvalidArgument(_)),
        "removing a non-empty directory should fail InvalidArgument, got {}",
        err
    );
    assert!(err.to_string().contains("not empty"));

    for dir in ["dir1/adir/nested", "dir1/adir"] {
        let outcome = ops::open_file(
            fsys,
            Path::new(dir),
            OpenFlags::remove(),
            OpenMode::default(),
        )
        .unwrap_or_else(|e| panic!("remove {}: {}", dir, e));
        assert!(outcome.is_none());
        assert_missing(fsys, dir);
    }
}

fn check_create_write(fsys: &dyn Vfs) {
    let file = "dir1/file1new";
    remove_tolerant(fsys, file);
    assert_missing(fsys, file);

    let mut handle = ops::open_file(
        fsys,
        Path::new(file),
        OpenFlags::write_only().with_create(),
        OpenMode::new(0o644),
    )
    .unwrap()
    .expect("create-open returns a handle");
    assert_eq!(handle.write(b"ciao\n").unwrap(), 5);
    handle.sync().unwrap();
    drop(handle);

    let md = fsys.stat(Path::new(file)).unwrap();
    assert_fresh(&md, file);
    assert_eq!(fsys.read_file(Path::new(file)).unwrap(), b"ciao\n");
}

fn reseed(fsys: &dyn Vfs, file: &str) {
    remove_tolerant(fsys, file);
    ops::write_file(fsys, Path::new(file), b"ciao\n").unwrap();
}

fn check_overwrite(fsys: &dyn Vfs) {
    let file = "dir1/file1new";
    reseed(fsys, file);

    let mut handle = ops::open_file(
        fsys,
        Path::new(file),
        OpenFlags::write_only(),
        OpenMode::new(0o644),
    )
    .unwrap()
    .unwrap();
    assert_eq!(handle.write(b"mi").unwrap(), 2);
    handle.sync().unwrap();
    drop(handle);

    // Plain write-opens overwrite in place; the tail is preserved.
    assert_eq!(fsys.read_file(Path::new(file)).unwrap(), b"miao\n");
    assert_fresh(&fsys.stat(Path::new(file)).unwrap(), file);
}

fn check_truncate(fsys: &dyn Vfs) {
    let file = "dir1/file1new";
    reseed(fsys, file);

    let mut handle = ops::open_file(
        fsys,
        Path::new(file),
        OpenFlags::write_only().with_truncate(),
        OpenMode::new(0o644),
    )
    .unwrap()
    .unwrap();
    assert_eq!(handle.write(b"mi").unwrap(), 2);
    handle.sync().unwrap();
    drop(handle);

    assert_eq!(fsys.read_file(Path::new(file)).unwrap(), b"mi");
}

fn check_append(fsys: &dyn Vfs) {
    let file = "dir1/file1new";
    reseed(fsys, file);

    let mut handle = ops::open_file(
        fsys,
        Path::new(file),
        OpenFlags::write_only().with_append(),
        OpenMode::new(0o644),
    )
    .unwrap()
    .unwrap();
    assert_eq!(handle.write(b"mi").unwrap(), 2);
    handle.sync().unwrap();
    drop(handle);

    assert_eq!(fsys.read_file(Path::new(file)).unwrap(), b"ciao\nmi");
}

fn check_open_errors(fsys: &dyn Vfs) {
    let err = ops::open_file(
        fsys,
        Path::new("unkfile"),
        OpenFlags::write_only(),
        OpenMode::default(),
    )
    .err().unwrap();
    assert!(matches!(err, VfsError::NotFound(_)));

    let err = ops::open_file(
        fsys,
        Path::new("unkfile"),
        OpenFlags::read_only(),
        OpenMode::default(),
    )
    .err().unwrap();
    assert!(matches!(err, VfsError::NotFound(_)));

    let err = ops::open_file(
        fsys,
        Path::new("dir1/file1"),
        OpenFlags::write_only().with_create().with_exclusive(),
        OpenMode::default(),
    )
    .err().unwrap();
    assert!(
        matches!(err, VfsError::AlreadyExists(_)),
        "exclusive create on an existing path should fail AlreadyExists, got {}",
        err
    );
}

fn check_read_only_handle(fsys: &dyn Vfs) {
    let mut handle = ops::open_file(
        fsys,
        Path::new("dir1/file1"),
        OpenFlags::read_only(),
        OpenMode::default(),
    )
    .unwrap()
    .unwrap();

    let err = handle.write(b"x").unwrap_err();
    assert!(
        matches!(err, VfsError::InvalidArgument(_)),
        "write through a read-only handle should fail InvalidArgument, got {}",
        err
    );
}
