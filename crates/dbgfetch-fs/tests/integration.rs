use dbgfetch_fs::{AtomicWriteOptions, Error, LockFile, StagedFile, atomic_write};
use tempfile::tempdir;

#[test]
fn test_atomic_write_overwrites() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamp");

    std::fs::write(&path, "original").unwrap();
    atomic_write(&path, b"new content", AtomicWriteOptions::new()).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"new content");
}

#[test]
fn test_staged_write_under_lock() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("debuginfo");
    let lock_path = dir.path().join(".debuginfo.lock");

    let lock = LockFile::try_lock(&lock_path).unwrap().unwrap();
    let mut staged = StagedFile::new(&dest).unwrap();
    staged.write_all(b"part one, ").unwrap();
    staged.write_all(b"part two").unwrap();
    staged.commit(AtomicWriteOptions::new().sync(false)).unwrap();
    drop(lock);

    assert_eq!(std::fs::read(&dest).unwrap(), b"part one, part two");
    assert!(LockFile::try_lock(&lock_path).unwrap().is_some());
}

#[test]
fn test_lock_contended_across_threads() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join(".executable.lock");
    let _held = LockFile::try_lock(&lock_path).unwrap().unwrap();

    let other = lock_path.clone();
    let contended = std::thread::spawn(move || LockFile::try_lock(&other).unwrap().is_none())
        .join()
        .unwrap();
    assert!(contended);
}

#[test]
fn test_error_reports_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing").join("debuginfo");
    let err = match StagedFile::new(&missing) {
        Err(err) => err,
        Ok(_) => panic!("expected an error"),
    };
    assert!(matches!(err, Error::Write { .. }));
    assert_eq!(err.path(), dir.path().join("missing"));
    assert_eq!(err.io_error().kind(), std::io::ErrorKind::NotFound);
}
