use std::sync::Arc;

use tempdir::TempDir;

use super::{db_path, init_log, with_db, UNIQUE};
use crate::{
    BlockCache, Bytewise, CryptoDb, Error, Fetched, LogStore, Options, OrderedStore, Status,
    Value, ValueType, WriteOptions,
};

fn raw_keys(dir: &TempDir) -> Vec<Vec<u8>> {
    let store = LogStore::<Bytewise>::open(
        db_path(dir),
        Options::default().store_options(),
        Arc::new(BlockCache::new(1024)),
    )
    .unwrap();
    store.keys()
}

#[test]
fn survives_reopen() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), b"secret", None, None).unwrap();
    for i in 0..100 {
        db.put_int(format!("key {i}").as_bytes(), i).unwrap();
    }
    db.delete(b"key 50").unwrap();
    drop(db);

    let db = CryptoDb::open(db_path(&dir), b"secret", None, None).unwrap();
    for i in 0..100 {
        let fetched = db.get(format!("key {i}").as_bytes(), ValueType::Int);
        if i == 50 {
            assert!(matches!(fetched, Err(Error::NotFound)));
        } else {
            assert_eq!(fetched.unwrap(), Fetched::Found(Value::Int(i)));
        }
    }
    drop(db);

    // another secret derives other keys, the entries are not reachable
    let db = CryptoDb::open(db_path(&dir), b"other", None, None).unwrap();
    assert!(matches!(db.get(b"key 1", ValueType::Int), Err(Error::NotFound)));
}

#[test]
fn keys_encryption_toggle() {
    init_log();
    let plain = Options {
        disable_keys_encryption: true,
        ..Default::default()
    };

    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), &UNIQUE, Some(&plain), None).unwrap();
    db.put_string(b"visible", "v").unwrap();
    drop(db);
    assert_eq!(raw_keys(&dir), vec![b"visible".to_vec()]);

    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), &UNIQUE, None, None).unwrap();
    db.put_string(b"hidden", "v").unwrap();
    drop(db);
    let keys = raw_keys(&dir);
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].len(), 16);
    assert_ne!(&keys[0][..6], b"hidden");
}

#[test]
fn wrong_secret_with_plain_keys() {
    init_log();
    let plain = Options {
        disable_keys_encryption: true,
        ..Default::default()
    };
    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), b"right", Some(&plain), None).unwrap();
    db.put_string(b"k", "some text that spans blocks").unwrap();
    drop(db);

    let db = CryptoDb::open(db_path(&dir), b"wrong", Some(&plain), None).unwrap();
    let err = db.get(b"k", ValueType::String).unwrap_err();
    assert!(matches!(err, Error::Malformed(_)));
    assert_eq!(err.code(), Status::Fail as i32);
}

#[test]
fn rejects_unaligned_records() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let store = LogStore::<Bytewise>::open(
        db_path(&dir),
        Options::default().store_options(),
        Arc::new(BlockCache::new(1024)),
    )
    .unwrap();
    store.put(&WriteOptions { sync: true }, b"short", &[1; 15]).unwrap();
    store.put(&WriteOptions { sync: true }, b"empty", &[]).unwrap();
    drop(store);

    let plain = Options {
        disable_keys_encryption: true,
        ..Default::default()
    };
    let db = CryptoDb::open(db_path(&dir), &UNIQUE, Some(&plain), None).unwrap();
    assert!(matches!(db.get(b"short", ValueType::Int), Err(Error::Malformed(_))));
    assert!(matches!(db.get(b"empty", ValueType::Int), Err(Error::Malformed(_))));
}

#[test]
fn nothing_is_created_on_bad_arguments() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let path = db_path(&dir);

    let partial = Options {
        max_open_files: 0,
        ..Default::default()
    };
    let err = CryptoDb::open(&path, &UNIQUE, Some(&partial), None).unwrap_err();
    assert_eq!(err.status(), Status::WrongArgument);
    assert!(matches!(
        CryptoDb::open(&path, b"", None, None),
        Err(Error::WrongArgument(_))
    ));
    assert!(matches!(
        CryptoDb::open(&path, &[1; 513], None, None),
        Err(Error::WrongArgument(_))
    ));
    assert!(matches!(
        CryptoDb::open("", &UNIQUE, None, None),
        Err(Error::WrongArgument(_))
    ));
    assert!(!path.exists());

    CryptoDb::open(&path, &[1; 512], None, None).unwrap();
    assert!(path.exists());
}

#[test]
fn close_is_idempotent() {
    with_db(None, |_, dir| {
        let mut db = CryptoDb::closed();
        db.close();
        db.close();

        db.reopen(dir.path().join("second"), b"secret", None, None)
            .unwrap();
        assert!(db.is_open());
        db.put_int(b"k", 1).unwrap();
        db.close();
        db.close();
        assert!(!db.is_open());
        assert!(matches!(db.get(b"k", ValueType::Int), Err(Error::NotOpen)));
    })
}

#[test]
fn reopen_releases_previous() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");

    let mut db = CryptoDb::open(&first, b"secret", None, None).unwrap();
    db.put_int(b"k", 1).unwrap();
    // held by `db`
    assert!(CryptoDb::open(&first, b"secret", None, None).is_err());

    db.reopen_with_keys(&second, &[3; 32], &[4; 16], None).unwrap();
    assert!(matches!(db.get(b"k", ValueType::Int), Err(Error::NotFound)));

    let other = CryptoDb::open(&first, b"secret", None, None).unwrap();
    assert_eq!(
        other.get(b"k", ValueType::Int).unwrap(),
        Fetched::Found(Value::Int(1))
    );
}

#[test]
fn failed_reopen_closes_previous() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");

    let mut db = CryptoDb::open(&first, b"secret", None, None).unwrap();
    db.put_int(b"k", 1).unwrap();
    assert!(format!("{db:?}").contains("first"));

    // rejected before the handle is touched
    assert!(matches!(
        db.reopen(&second, b"", None, None),
        Err(Error::WrongArgument(_))
    ));
    assert!(db.is_open());

    let partial = Options {
        cache_capacity: 0,
        ..Default::default()
    };
    let err = db.reopen(&second, b"secret", Some(&partial), None).unwrap_err();
    assert!(matches!(err, Error::WrongArgument(_)));
    assert!(!db.is_open());
    assert!(matches!(db.get(b"k", ValueType::Int), Err(Error::NotOpen)));
    assert!(!second.exists());
    assert!(!format!("{db:?}").contains("first"));

    let other = CryptoDb::open(&first, b"secret", None, None).unwrap();
    assert_eq!(
        other.get(b"k", ValueType::Int).unwrap(),
        Fetched::Found(Value::Int(1))
    );
}

#[test]
fn second_handle_is_refused() {
    with_db(None, |_, dir| {
        let err = CryptoDb::open(db_path(dir), &UNIQUE, None, None).unwrap_err();
        assert!(matches!(err, Error::Store));
        assert_eq!(err.code(), -1024);
    })
}

#[test]
fn destroy() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let path = db_path(&dir);

    let db = CryptoDb::open(&path, &UNIQUE, None, None).unwrap();
    db.put_string(b"k", "v").unwrap();
    assert!(CryptoDb::destroy(&path, None).is_err());

    let partial = Options {
        cache_capacity: 0,
        ..Default::default()
    };
    assert!(matches!(
        CryptoDb::destroy(&path, Some(&partial)),
        Err(Error::WrongArgument(_))
    ));
    drop(db);

    CryptoDb::destroy(&path, Some(&Options::default())).unwrap();
    assert!(!path.exists());
    CryptoDb::destroy(&path, None).unwrap();

    let db = CryptoDb::open(&path, &UNIQUE, None, None).unwrap();
    assert!(matches!(db.get(b"k", ValueType::String), Err(Error::NotFound)));
}

#[test]
fn small_segments_survive_compaction() {
    init_log();
    let small = Options {
        max_file_size: 256,
        write_buffer_size: 512,
        ..Default::default()
    };
    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), &UNIQUE, Some(&small), None).unwrap();
    for round in 0..20 {
        for i in 0..8 {
            let key = format!("key {i}");
            db.put_string(key.as_bytes(), &format!("round {round} value {i}"))
                .unwrap();
        }
    }
    drop(db);

    let store = LogStore::<Bytewise>::open(
        db_path(&dir),
        small.store_options(),
        Arc::new(BlockCache::new(1)),
    )
    .unwrap();
    let stats = store.stats();
    assert_eq!(stats.entries, 8);
    assert!(stats.obsolete_bytes <= 512);
    drop(store);

    let db = CryptoDb::open(db_path(&dir), &UNIQUE, Some(&small), None).unwrap();
    for i in 0..8 {
        let key = format!("key {i}");
        assert_eq!(
            db.get(key.as_bytes(), ValueType::String).unwrap(),
            Fetched::Found(Value::String(format!("round 19 value {i}")))
        );
    }
}
