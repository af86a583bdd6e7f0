use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::Error;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String = 1,
    Int = 2,
    Double = 3,
    Unknown = 4,
}

impl ValueType {
    fn tag(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Int => Some("int"),
            Self::Double => Some("double"),
            Self::Unknown => None,
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => Self::String,
            "int" => Self::Int,
            "double" => Self::Double,
            _ => Self::Unknown,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::String,
            2 => Self::Int,
            3 => Self::Double,
            _ => Self::Unknown,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Integer number",
            Self::Double => "Double-precision floating-point number",
            Self::Unknown => "Unknown value type",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    Double(f64),
}

impl Value {
    pub fn kind(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

#[derive(Serialize)]
struct Outgoing<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    val: Payload<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload<'a> {
    String(&'a str),
    Int(i32),
    Double(f64),
}

#[derive(Deserialize)]
struct Incoming {
    #[serde(rename = "type")]
    kind: String,
    val: serde_json::Value,
}

/// Minified `{"type":..,"val":..}` text of `value`, without terminator.
pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
    let val = match value {
        Value::String(s) => Payload::String(s),
        Value::Int(v) => Payload::Int(*v),
        Value::Double(v) if v.is_finite() => Payload::Double(*v),
        Value::Double(_) => return Err(Error::WrongArgument("double is not finite")),
    };
    let kind = value.kind().tag().ok_or(Error::WrongArgument("unknown value type"))?;
    serde_json::to_vec(&Outgoing { kind, val }).map_err(|_| Error::Malformed("cannot encode"))
}

/// A decoded record whose type is known but whose payload is not yet
/// extracted.
#[derive(Debug)]
pub struct Tagged {
    kind: ValueType,
    val: serde_json::Value,
}

impl Tagged {
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    pub fn into_value(self) -> Result<Value, Error> {
        let value = match self.kind {
            ValueType::String => self.val.as_str().map(|s| Value::String(s.to_owned())),
            // stored numbers may be written as doubles, truncate like a C cast
            ValueType::Int => self
                .val
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .or_else(|| self.val.as_f64().map(|v| v as i32))
                .map(Value::Int),
            ValueType::Double => self.val.as_f64().map(Value::Double),
            ValueType::Unknown => None,
        };
        value.ok_or(Error::Malformed("payload does not match its type"))
    }
}

/// Parses decrypted text. Anything after the first NUL is padding.
pub fn decode(text: &[u8]) -> Result<Tagged, Error> {
    let end = text.iter().position(|b| *b == 0).unwrap_or(text.len());
    let Incoming { kind, val } =
        serde_json::from_slice(&text[..end]).map_err(|_| Error::Malformed("not a tagged value"))?;
    Ok(Tagged {
        kind: ValueType::from_tag(&kind),
        val,
    })
}
