use thiserror::Error;

use crate::lock::Lock;
use crate::snapshot::EntitySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdlockErrorCode {
    Io,
    Encode,
    Decode,
    IllegalArgument,
    InvalidConfig,
    PessimisticConflict,
    OptimisticConflict,
}

impl EdlockErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            EdlockErrorCode::Io => "io",
            EdlockErrorCode::Encode => "encode",
            EdlockErrorCode::Decode => "decode",
            EdlockErrorCode::IllegalArgument => "illegal_argument",
            EdlockErrorCode::InvalidConfig => "invalid_config",
            EdlockErrorCode::PessimisticConflict => "pessimistic_conflict",
            EdlockErrorCode::OptimisticConflict => "optimistic_conflict",
        }
    }
}

#[derive(Debug, Error)]
pub enum EdlockError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("target '{}' is exclusively locked by '{}'", .lock.target, .lock.owner)]
    PessimisticConflict { lock: Box<Lock> },
    /// `current` holds the freshly loaded persisted state; `None` means the
    /// entity was deleted after the snapshot was taken.
    #[error("optimistic lock conflict: persisted state no longer matches snapshot")]
    OptimisticConflict {
        current: Option<Box<EntitySnapshot>>,
    },
}

impl EdlockError {
    pub fn code(&self) -> EdlockErrorCode {
        match self {
            EdlockError::Io(_) => EdlockErrorCode::Io,
            EdlockError::Encode(_) => EdlockErrorCode::Encode,
            EdlockError::Decode(_) => EdlockErrorCode::Decode,
            EdlockError::IllegalArgument(_) => EdlockErrorCode::IllegalArgument,
            EdlockError::InvalidConfig { .. } => EdlockErrorCode::InvalidConfig,
            EdlockError::PessimisticConflict { .. } => EdlockErrorCode::PessimisticConflict,
            EdlockError::OptimisticConflict { .. } => EdlockErrorCode::OptimisticConflict,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}
