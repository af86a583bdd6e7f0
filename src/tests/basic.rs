use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};
use tempdir::TempDir;

use super::{db_path, init_log, with_db};
use crate::{
    CryptoDb, Direction, Error, Fetched, KdfError, KeyDerivation, KeyMaterial, Status, UniqueData,
    Value, ValueType,
};

fn compare_double(a: f64, b: f64) -> bool {
    (a - b).abs() <= a.abs().max(b.abs()) * f64::EPSILON
}

#[test]
fn double_then_delete() {
    with_db(None, |db, _| {
        db.put_double(b"k", 42.4242).unwrap();
        let Fetched::Found(Value::Double(v)) = db.get(b"k", ValueType::Double).unwrap() else {
            panic!("expected a double");
        };
        assert!(compare_double(v, 42.4242));

        db.delete(b"k").unwrap();
        let err = db.get(b"k", ValueType::Double).unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert_eq!(err.status(), Status::Fail);
    })
}

#[test]
fn round_trip() {
    with_db(None, |db, _| {
        let values = [
            Value::from("hello"),
            Value::from(""),
            Value::from("ünïcødé ключ 鍵"),
            Value::Int(0),
            Value::Int(i32::MIN),
            Value::Int(i32::MAX),
            Value::Double(-0.5),
            Value::Double(1e300),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("key {i}");
            db.put(key.as_bytes(), value).unwrap();
            let fetched = db.get(key.as_bytes(), value.kind()).unwrap();
            assert_eq!(fetched, Fetched::Found(value.clone()));
        }
    })
}

#[test]
fn round_trip_with_keys() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let key = [0x42; 32];
    let iv = [0x24; 16];
    let db = CryptoDb::open_with_keys(db_path(&dir), &key, &iv, None).unwrap();

    db.put_string(b"string", "text").unwrap();
    db.put_int(b"int", -7).unwrap();
    db.put_double(b"double", 3.25).unwrap();

    let mut slot = Value::from("");
    assert_eq!(db.get_into(b"string", &mut slot), 0);
    assert_eq!(slot, Value::from("text"));
    let mut slot = Value::Int(0);
    assert_eq!(db.get_into(b"int", &mut slot), 0);
    assert_eq!(slot, Value::Int(-7));
    let mut slot = Value::Double(0.0);
    assert_eq!(db.get_into(b"double", &mut slot), 0);
    assert_eq!(slot, Value::Double(3.25));
}

#[test]
fn wrong_type_leaves_slot() {
    with_db(None, |db, _| {
        db.put_int(b"k", 42).unwrap();

        let mut slot = Value::from("untouched");
        let code = db.get_into(b"k", &mut slot);
        assert_eq!(code, ValueType::Int as i32);
        assert_eq!(slot, Value::from("untouched"));

        assert_eq!(
            db.get(b"k", ValueType::Double).unwrap(),
            Fetched::WrongType(ValueType::Int)
        );

        let mut slot = Value::Double(1.0);
        assert_eq!(db.get_into(b"missing", &mut slot), Status::Fail as i32);
        assert_eq!(slot, Value::Double(1.0));
    })
}

#[test]
fn overwrite_changes_type() {
    with_db(None, |db, _| {
        db.put_int(b"k", 1).unwrap();
        db.put_string(b"k", "one").unwrap();
        assert_eq!(
            db.get(b"k", ValueType::String).unwrap(),
            Fetched::Found(Value::from("one"))
        );
        assert_eq!(
            db.get(b"k", ValueType::Int).unwrap(),
            Fetched::WrongType(ValueType::String)
        );
    })
}

#[test]
fn large_payload() {
    with_db(None, |db, _| {
        let mut rng = StdRng::seed_from_u64(0x123);
        let text = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(8 * 1024 + 7)
            .map(char::from)
            .collect::<String>();
        let mut key = vec![0; 40];
        rng.fill(&mut key[..]);

        db.put_string(&key, &text).unwrap();
        let fetched = db.get(&key, ValueType::String).unwrap();
        assert_eq!(fetched, Fetched::Found(Value::String(text)));
    })
}

#[test]
fn arguments_are_checked() {
    with_db(None, |db, _| {
        assert!(matches!(db.put_int(b"", 1), Err(Error::WrongArgument(_))));
        assert!(matches!(db.get(b"", ValueType::Int), Err(Error::WrongArgument(_))));
        assert!(matches!(db.delete(b""), Err(Error::WrongArgument(_))));

        let value = Value::Int(1);
        let err = db.put_typed(b"k", ValueType::Unknown, &value).unwrap_err();
        assert_eq!(err.status(), Status::WrongArgument);
        let err = db.put_typed(b"k", ValueType::String, &value).unwrap_err();
        assert_eq!(err.code(), -3);
        assert!(matches!(db.put_double(b"k", f64::INFINITY), Err(Error::WrongArgument(_))));
        assert!(matches!(db.get(b"k", ValueType::Int), Err(Error::NotFound)));
    })
}

#[test]
fn closed_handle() {
    let db = CryptoDb::closed();
    assert!(!db.is_open());
    assert!(matches!(db.put_int(b"k", 1), Err(Error::NotOpen)));
    assert!(matches!(db.delete(b"k"), Err(Error::NotOpen)));
    let mut slot = Value::Int(5);
    assert_eq!(db.get_into(b"k", &mut slot), Status::NullPointer as i32);
    assert_eq!(slot, Value::Int(5));
}

fn zero_kdf(_: &UniqueData, _: Direction) -> Result<KeyMaterial, KdfError> {
    Ok(KeyMaterial::new([0; 32], [0; 16]))
}

#[test]
fn custom_kdf() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), b"ignored", None, Some(Box::new(zero_kdf))).unwrap();
    db.put_string(b"k", "by override").unwrap();
    drop(db);

    // zero key material supplied directly reads the same records
    let db = CryptoDb::open_with_keys(db_path(&dir), &[0; 32], &[0; 16], None).unwrap();
    assert_eq!(
        db.get(b"k", ValueType::String).unwrap(),
        Fetched::Found(Value::from("by override"))
    );
}

struct Refusing;

impl KeyDerivation for Refusing {
    fn derive(&self, _: &UniqueData, direction: Direction) -> Result<KeyMaterial, KdfError> {
        Err(KdfError(format!("refusing to {direction:?}")))
    }
}

#[test]
fn failing_kdf_is_labelled_by_direction() {
    init_log();
    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), b"secret", None, Some(Box::new(Refusing))).unwrap();

    assert!(matches!(db.put_int(b"k", 1), Err(Error::EncryptionFail)));
    assert!(matches!(db.get(b"k", ValueType::Int), Err(Error::DecryptionFail)));
    assert!(matches!(db.delete(b"k"), Err(Error::EncryptionFail)));
    let mut slot = Value::Int(0);
    assert_eq!(db.get_into(b"k", &mut slot), Status::DecryptionFail as i32);
}
