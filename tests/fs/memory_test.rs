/*!
 * MemFs Tests
 * Conformance run and write-semantics properties for the reference backend
 */

use std::path::Path;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use virtfs::{conformance, ops, MemFs, OpenFlags, OpenMode, Vfs, VfsError, WriteFs};

#[test]
fn test_memfs_passes_conformance() {
    conformance::test_fs(&MemFs::new());
}

#[test]
fn test_handle_metadata_tracks_entry() {
    let fsys = MemFs::new();
    ops::write_file(&fsys, Path::new("f"), b"abcdef").unwrap();

    let mut handle = fsys.open(Path::new("f")).unwrap();
    let md = handle.metadata().unwrap();
    assert_eq!(md.name, "f");
    assert_eq!(md.size, 6);

    // Two handles share the same entry bytes.
    let mut writer = fsys
        .open_file(
            Path::new("f"),
            OpenFlags::write_only().with_append(),
            OpenMode::default(),
        )
        .unwrap()
        .unwrap();
    writer.write(b"gh").unwrap();
    assert_eq!(handle.metadata().unwrap().size, 8);
}

#[test]
fn test_write_mode_on_directory() {
    let fsys = MemFs::new();
    ops::make_dir(&fsys, Path::new("d"), virtfs::Permissions::dir_default()).unwrap();

    assert!(matches!(
        fsys.open_file(Path::new("d"), OpenFlags::write_only(), OpenMode::default()),
        Err(VfsError::IsADirectory(_))
    ));
    assert!(matches!(
        fsys.open_file(Path::new("."), OpenFlags::write_only(), OpenMode::default()),
        Err(VfsError::IsADirectory(_))
    ));
}

#[test]
fn test_remove_root_fails() {
    let fsys = MemFs::new();
    assert!(matches!(
        fsys.open_file(Path::new("."), OpenFlags::remove(), OpenMode::default()),
        Err(VfsError::NotFound(_))
    ));
}

proptest! {
    /// Plain write-opens behave like pwrite at offset zero: the patch
    /// replaces the head and the remaining tail is preserved.
    #[test]
    fn prop_overwrite_matches_model(
        initial in proptest::collection::vec(any::<u8>(), 0..64),
        patch in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let fsys = MemFs::new();
        ops::write_file(&fsys, Path::new("f"), &initial).unwrap();

        let mut handle = fsys
            .open_file(Path::new("f"), OpenFlags::write_only(), OpenMode::default())
            .unwrap()
            .unwrap();
        prop_assert_eq!(handle.write(&patch).unwrap(), patch.len());
        drop(handle);

        let expected = if patch.len() >= initial.len() {
            patch.clone()
        } else {
            let mut v = patch.clone();
            v.extend_from_slice(&initial[patch.len()..]);
            v
        };
        prop_assert_eq!(fsys.read_file(Path::new("f")).unwrap(), expected);
    }

    /// Append-opens start the cursor at the current length.
    #[test]
    fn prop_append_matches_model(
        initial in proptest::collection::vec(any::<u8>(), 0..64),
        patch in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let fsys = MemFs::new();
        ops::write_file(&fsys, Path::new("f"), &initial).unwrap();

        let mut handle = fsys
            .open_file(
                Path::new("f"),
                OpenFlags::write_only().with_append(),
                OpenMode::default(),
            )
            .unwrap()
            .unwrap();
        prop_assert_eq!(handle.write(&patch).unwrap(), patch.len());
        drop(handle);

        let mut expected = initial.clone();
        expected.extend_from_slice(&patch);
        prop_assert_eq!(fsys.read_file(Path::new("f")).unwrap(), expected);
    }
}
