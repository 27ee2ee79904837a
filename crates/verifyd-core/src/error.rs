use thiserror::Error;

pub type VerifydResult<T> = Result<T, VerifydError>;

#[derive(Debug, Error)]
pub enum VerifydError {
    #[error("upload quota exhausted")]
    QuotaExceeded,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("stamping failed: {0}")]
    StampingFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not certified: {0}")]
    NotCertified(String),

    #[error("already certified: {0}")]
    AlreadyCertified(String),

    #[error("staged source missing: {0}")]
    SourceMissing(String),

    #[error("internal error: {0}")]
    Internal(String),
}
