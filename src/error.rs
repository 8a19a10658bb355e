//! Single error type shared by every backend and media-host call.
use reqwest::StatusCode;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Coarse classification callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Status,
    Decode,
    Validation,
    Unauthorized,
    NotFound,
    Busy,
    Unsupported,
    Storage,
    OrphanedAsset,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Status => "status",
            ErrorKind::Decode => "decode",
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Busy => "busy",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Storage => "storage",
            ErrorKind::OrphanedAsset => "orphaned_asset",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to reach {target}: {source}")]
    Transport {
        target: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{target} returned {status}: {body}")]
    Status {
        target: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("invalid response from {target}: {message}")]
    Decode {
        target: &'static str,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("session rejected by backend; sign in again")]
    Unauthorized,
    #[error("no record with id {0}")]
    NotFound(String),
    #[error("record {0} already has a pending change")]
    Busy(String),
    #[error("{0} is not supported for this resource")]
    Unsupported(&'static str),
    #[error("session storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("media asset {public_id} was uploaded but not saved ({reason}); remove it manually")]
    OrphanedAsset { public_id: String, reason: String },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Status { .. } => ErrorKind::Status,
            ApiError::Decode { .. } => ErrorKind::Decode,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Busy(_) => ErrorKind::Busy,
            ApiError::Unsupported(_) => ErrorKind::Unsupported,
            ApiError::Storage(_) => ErrorKind::Storage,
            ApiError::OrphanedAsset { .. } => ErrorKind::OrphanedAsset,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub(crate) fn decode(target: &'static str, err: impl std::fmt::Display) -> Self {
        ApiError::Decode {
            target,
            message: err.to_string(),
        }
    }
}
