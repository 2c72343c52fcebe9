/*!
 * Wrapper Tests
 * Deferred initialization and mutual exclusion over arbitrary backends
 */

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use virtfs::{conformance, ops, LazyFs, MemFs, SyncFs, Vfs, VfsError};

#[test]
fn test_wrapped_stack_passes_conformance() {
    crate::init_logging();

    let fsys = SyncFs::new(Arc::new(LazyFs::new(|| {
        Ok(Arc::new(MemFs::new()) as Arc<dyn Vfs>)
    })));
    conformance::test_fs(&fsys);
}

#[test]
fn test_lazy_retries_until_first_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fsys = LazyFs::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Err(VfsError::Io("not ready".to_string()))
        } else {
            let inner = MemFs::new();
            ops::write_file(&inner, Path::new("ready"), b"yes").unwrap();
            Ok(Arc::new(inner) as Arc<dyn Vfs>)
        }
    });

    // The factory's error surfaces while initialization keeps failing.
    assert!(matches!(
        fsys.read_file(Path::new("ready")),
        Err(VfsError::Io(_))
    ));

    assert_eq!(fsys.read_file(Path::new("ready")).unwrap(), b"yes");
    fsys.stat(Path::new("ready")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_lazy_forwards_write_capabilities() {
    let fsys = LazyFs::new(|| Ok(Arc::new(MemFs::new()) as Arc<dyn Vfs>));

    ops::make_dir(&fsys, Path::new("d"), virtfs::Permissions::dir_default()).unwrap();
    ops::write_file(&fsys, Path::new("d/f"), b"x").unwrap();
    ops::remove(&fsys, Path::new("d/f")).unwrap();
    assert!(matches!(
        fsys.stat(Path::new("d/f")),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_sync_orders_concurrent_writers() {
    let fsys = Arc::new(SyncFs::new(Arc::new(MemFs::new())));

    let mut joins = Vec::new();
    for worker in 0..4 {
        let fsys = Arc::clone(&fsys);
        joins.push(thread::spawn(move || {
            for i in 0..16 {
                let name = format!("w{}-{}", worker, i);
                ops::write_file(&*fsys, Path::new(&name), name.as_bytes()).unwrap();
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }

    assert_eq!(fsys.read_dir(Path::new(".")).unwrap().len(), 64);
}
