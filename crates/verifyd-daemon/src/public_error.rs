use axum::http::StatusCode;

use verifyd_core::VerifydError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicErrorCode {
    InvalidInput,
    QuotaExceeded,
    NotFound,
    NotCertified,
    AlreadyCertified,
    StampingFailed,
    SourceMissing,
    Internal,
}

impl PublicErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::NotCertified => "NOT_CERTIFIED",
            Self::AlreadyCertified => "ALREADY_CERTIFIED",
            Self::StampingFailed => "STAMPING_FAILED",
            Self::SourceMissing => "SOURCE_MISSING",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Maps a domain error to its public surface. Messages are fixed per code;
/// internal detail strings stay in the server logs and never reach clients.
pub fn public_error(err: &VerifydError) -> (StatusCode, PublicErrorCode, &'static str) {
    match err {
        VerifydError::QuotaExceeded => (
            StatusCode::TOO_MANY_REQUESTS,
            PublicErrorCode::QuotaExceeded,
            "free upload limit reached; subscribe to continue",
        ),
        VerifydError::InvalidInput(_) => (
            StatusCode::BAD_REQUEST,
            PublicErrorCode::InvalidInput,
            "invalid request",
        ),
        VerifydError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            PublicErrorCode::NotFound,
            "certificate not found",
        ),
        VerifydError::NotCertified(_) => (
            StatusCode::FORBIDDEN,
            PublicErrorCode::NotCertified,
            "certificate is not releasable",
        ),
        VerifydError::AlreadyCertified(_) => (
            StatusCode::CONFLICT,
            PublicErrorCode::AlreadyCertified,
            "certificate already certified",
        ),
        VerifydError::StampingFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            PublicErrorCode::StampingFailed,
            "stamping failed; submission was not recorded",
        ),
        VerifydError::SourceMissing(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            PublicErrorCode::SourceMissing,
            "staged source lost; re-submission required",
        ),
        VerifydError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            PublicErrorCode::Internal,
            "internal error",
        ),
    }
}
