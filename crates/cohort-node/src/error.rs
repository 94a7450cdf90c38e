//! Error types for Cohort.

use crate::models::GroupStatus;
use thiserror::Error;

/// Result type for Cohort operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Cohort operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Deal id unknown
    #[error("deal {0} not found")]
    DealNotFound(u64),

    /// Group id (or invite token) unknown
    #[error("group {0} not found")]
    GroupNotFound(String),

    /// Redemption code unknown
    #[error("redemption {0} not found")]
    RedemptionNotFound(String),

    /// Group has already left the open state
    #[error("group {group_id} is {status}, not open")]
    GroupNotOpen { group_id: u64, status: GroupStatus },

    /// Deal is closed or outside its window
    #[error("deal {0} is not accepting new groups")]
    DealNotActive(u64),

    /// Redemption was already claimed
    #[error("redemption {0} has already been redeemed")]
    AlreadyRedeemed(String),

    /// Lock attempted below the deal's minimum
    #[error("minimum participants not met: need {required}, have {actual}")]
    MinimumParticipantsNotMet { required: u32, actual: u32 },

    /// Malformed input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Lock wait timed out or the transaction conflicted; retry the whole operation
    #[error("transient storage error: {0}")]
    TransientStore(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker task failed
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    PreconditionFailed,
    Validation,
    TransientStore,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::PreconditionFailed => "precondition_failed",
            Self::Validation => "validation",
            Self::TransientStore => "transient_store",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DealNotFound(_) | Error::GroupNotFound(_) | Error::RedemptionNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::GroupNotOpen { .. } | Error::DealNotActive(_) | Error::AlreadyRedeemed(_) => {
                ErrorKind::InvalidState
            }
            Error::MinimumParticipantsNotMet { .. } => ErrorKind::PreconditionFailed,
            Error::InvalidInput(_) => ErrorKind::Validation,
            Error::TransientStore(_) => ErrorKind::TransientStore,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only transient store failures may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }

    pub(crate) fn group_not_found(group_id: u64) -> Self {
        Error::GroupNotFound(group_id.to_string())
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TimedOut | rocksdb::ErrorKind::TryAgain => {
                Error::TransientStore(e.to_string())
            }
            _ => Error::Storage(e.to_string()),
        }
    }
}

impl From<cohort_tiers::LadderError> for Error {
    fn from(e: cohort_tiers::LadderError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}
