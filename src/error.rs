use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database is not open")]
    NotOpen,
    #[error("failed to allocate enough memory")]
    AllocateMem,
    #[error("wrong argument: {0}")]
    WrongArgument(&'static str),
    #[error("encryption operation failed")]
    EncryptionFail,
    #[error("decryption operation failed")]
    DecryptionFail,
    #[error("entry not found")]
    NotFound,
    #[error("malformed entry: {0}")]
    Malformed(&'static str),
    #[error("another instance is already open")]
    Busy,
    #[error("storage failure")]
    Store,
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::NotOpen => Status::NullPointer,
            Self::AllocateMem => Status::AllocateMem,
            Self::WrongArgument(_) => Status::WrongArgument,
            Self::EncryptionFail => Status::EncryptionFail,
            Self::DecryptionFail => Status::DecryptionFail,
            Self::NotFound | Self::Malformed(_) | Self::Busy | Self::Store => Status::Fail,
        }
    }

    pub fn code(&self) -> i32 {
        self.status() as i32
    }
}

// Storage diagnostics are bucketed, the detail only reaches the log.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        log::warn!("store: {err}");
        match err {
            StoreError::InvalidArgument(_) => Self::WrongArgument("rejected by store"),
            StoreError::Io(_) | StoreError::Corruption(_) => Self::Store,
        }
    }
}

/// Integer status codes of the C-compatible surface.
///
/// Negative values are errors. A successful `get` may also yield a positive
/// [`ValueType`](crate::ValueType) code, see [`CryptoDb::get_into`](crate::CryptoDb::get_into).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    NullPointer = -1,
    AllocateMem = -2,
    WrongArgument = -3,
    EncryptionFail = -4,
    DecryptionFail = -5,
    Fail = -1024,
}

impl Status {
    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            0 => Self::Ok,
            -1 => Self::NullPointer,
            -2 => Self::AllocateMem,
            -3 => Self::WrongArgument,
            -4 => Self::EncryptionFail,
            -5 => Self::DecryptionFail,
            -1024 => Self::Fail,
            _ => return None,
        };
        Some(status)
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::NullPointer => "NULL pointer",
            Self::AllocateMem => "Failed to allocate enough memory",
            Self::WrongArgument => "Wrong argument was provided",
            Self::EncryptionFail => "Encryption operation was failed",
            Self::DecryptionFail => "Decryption operation was failed",
            Self::Fail => "Fail",
        }
    }
}
