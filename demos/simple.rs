use std::path::PathBuf;

use cryptodb::{CryptoDb, Fetched, Status, Value, ValueType};

fn main() {
    let env = env_logger::Env::new().filter_or("RUST_LOG", "debug");
    env_logger::try_init_from_env(env).unwrap_or_default();

    let path = PathBuf::from("target/cryptodb_demo");
    CryptoDb::destroy(&path, None).unwrap_or_default();

    let unique_data = b"any bytes up to 512 long, e.g. a device id";
    let db = CryptoDb::open(&path, unique_data, None, None).unwrap();
    drop(db);
    let db = CryptoDb::open(&path, unique_data, None, None).unwrap();

    db.put_string(b"name", "cryptodb").unwrap();
    db.put_int(b"answer", 42).unwrap();
    db.put_double(b"ratio", 42.4242).unwrap();

    drop(db);
    let db = CryptoDb::open(&path, unique_data, None, None).unwrap();

    for (key, kind) in [
        (&b"name"[..], ValueType::String),
        (&b"answer"[..], ValueType::Int),
        (&b"ratio"[..], ValueType::Double),
    ] {
        match db.get(key, kind).unwrap() {
            Fetched::Found(value) => log::info!("{} = {value}", String::from_utf8_lossy(key)),
            Fetched::WrongType(kind) => log::warn!("unexpected {kind:?}"),
        }
    }

    let mut slot = Value::from("");
    let code = db.get_into(b"answer", &mut slot);
    log::info!("string slot for an int: code {code}, {}", ValueType::Int.describe());

    db.delete(b"ratio").unwrap();
    let code = db.get_into(b"ratio", &mut Value::Double(0.0));
    let status = Status::from_code(code).unwrap_or(Status::Fail);
    log::info!("after delete: {code} ({})", status.describe());

    drop(db);
    CryptoDb::destroy(&path, None).unwrap();
}
