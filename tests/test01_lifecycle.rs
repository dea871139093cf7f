mod common;

use std::thread;

use mailbox_sqlite::prelude::*;

#[test]
fn open_creates_missing_file() -> Result<(), Box<dyn std::error::Error>> {
    common::init_tracing();
    let (_dir, path) = common::temp_db("created.db");
    assert!(!path.exists());

    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();
    assert!(!db.is_open());
    db.open(&path)?;
    assert!(db.is_open());
    assert_eq!(db.path(), Some(path.as_path()));
    assert!(path.exists());
    assert!(db.table_exists("config")?);
    Ok(())
}

#[test]
fn second_open_reports_already_open() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, path) = common::temp_db("twice.db");
    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();
    db.open(&path)?;

    let err = db.open(&path).unwrap_err();
    assert!(matches!(err, SqliteHandleError::AlreadyOpen));
    assert!(db.is_open());
    Ok(())
}

#[test]
fn failed_open_leaves_handle_closed() {
    common::init_tracing();
    let (dir, _path) = common::temp_db("unused.db");
    let bad = dir.path().join("no").join("such").join("dir.db");

    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();
    let err = db.open(&bad).unwrap_err();
    match &err {
        SqliteHandleError::OpenFailed { path, .. } => assert!(path.ends_with("dir.db")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.engine_message().is_some());
    assert!(!db.is_open());
    assert_eq!(db.path(), None);
}

#[test]
fn file_that_is_not_a_database_fails_to_open() {
    common::init_tracing();
    let (_dir, path) = common::temp_db("garbage.db");
    std::fs::write(&path, vec![0x42_u8; 8 * 1024]).expect("write junk file");

    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();
    let err = db.open(&path).unwrap_err();
    match &err {
        SqliteHandleError::OpenFailed { path, .. } => assert!(path.ends_with("garbage.db")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.engine_message().is_some());
    assert!(!db.is_open());
    assert_eq!(db.path(), None);
    assert_eq!(db.compiled_slots(), 0);
}

#[test]
fn read_only_open_does_not_create_file() {
    let (_dir, path) = common::temp_db("readonly.db");
    let options = SqliteOptions::builder().read_only(true).finish();
    let handle = SqliteHandle::with_options("lifecycle", options);
    let mut db = handle.lock();

    assert!(matches!(
        db.open(&path),
        Err(SqliteHandleError::OpenFailed { .. })
    ));
    assert!(!path.exists());
}

#[test]
fn closed_handle_fails_fast() {
    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();

    assert!(matches!(db.execute("SELECT 1;"), Err(SqliteHandleError::NotOpen)));
    assert!(matches!(db.table_exists("config"), Err(SqliteHandleError::NotOpen)));
    assert!(matches!(
        db.prepare_ad_hoc("SELECT 1;"),
        Err(SqliteHandleError::NotOpen)
    ));
    assert!(matches!(
        db.predefine(StatementSlot::CountChats, "SELECT COUNT(*) FROM chats;"),
        Err(SqliteHandleError::NotOpen)
    ));
    assert!(matches!(db.set("k", "v"), Err(SqliteHandleError::NotOpen)));
    assert!(matches!(db.commit(), Err(SqliteHandleError::NotOpen)));
    assert!(matches!(db.rollback(), Err(SqliteHandleError::NotOpen)));

    db.begin_transaction();
    assert_eq!(db.transaction_depth(), 0);
    assert_eq!(db.get("k", "fallback"), "fallback");
    assert_eq!(db.get_int("n", 7), 7);
}

#[test]
fn close_is_idempotent_and_resets_state() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, path) = common::temp_db("close.db");
    let handle = SqliteHandle::new("lifecycle");
    let mut db = handle.lock();
    db.open(&path)?;
    db.set("k", "v")?;
    db.begin_transaction();
    db.begin_transaction();
    assert!(db.compiled_slots() > 0);

    db.close();
    assert!(!db.is_open());
    assert_eq!(db.transaction_depth(), 0);
    assert_eq!(db.compiled_slots(), 0);
    db.close();
    assert!(!db.is_open());

    db.open(&path)?;
    assert_eq!(db.transaction_depth(), 0);
    assert!(!db.in_physical_transaction());
    assert_eq!(db.get("k", ""), "v");
    Ok(())
}

#[test]
fn closing_inside_a_transaction_discards_the_work() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, path) = common::temp_db("discard.db");
    let handle = SqliteHandle::new("lifecycle");
    {
        let mut db = handle.lock();
        db.open(&path)?;
        db.begin_transaction();
        db.set("pending", "yes")?;
        db.close();
    }
    let mut db = handle.lock();
    db.open(&path)?;
    assert_eq!(db.get("pending", "no"), "no");
    Ok(())
}

#[test]
fn dropping_the_handle_closes_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, path) = common::temp_db("drop.db");
    {
        let handle = SqliteHandle::new("first");
        let mut db = handle.lock();
        db.open(&path)?;
        db.set("persisted", "1")?;
    }
    let handle = SqliteHandle::new("second");
    let mut db = handle.lock();
    db.open(&path)?;
    assert_eq!(db.get_int("persisted", 0), 1);
    Ok(())
}

#[test]
fn try_lock_fails_while_lock_is_held() {
    let handle = SqliteHandle::new("lifecycle");
    assert!(!handle.is_locked());

    let held = handle.lock();
    assert!(handle.is_locked());
    assert!(handle.try_lock().is_none());

    held.unlock();
    assert!(!handle.is_locked());
    assert!(handle.try_lock().is_some());
}

#[test]
fn lock_serializes_read_modify_write_across_threads() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, path) = common::temp_db("threads.db");
    let handle = SqliteHandle::new("lifecycle");
    handle.lock().open(&path)?;

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    let mut db = handle.lock();
                    let current = db.get_int("counter", 0);
                    db.set_int("counter", current + 1).expect("set counter");
                }
            });
        }
    });

    assert_eq!(handle.lock().get_int("counter", 0), 100);
    Ok(())
}
