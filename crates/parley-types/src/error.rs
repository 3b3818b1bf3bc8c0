use thiserror::Error;

/// Errors from the persistent session store.
///
/// The store adapter never retries internally; it classifies failures as
/// transient (`Unavailable`) or permanent (`Rejected`) and leaves retry
/// decisions to the caller, because history replacement is not idempotent.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("session record not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected operation: {0}")]
    Rejected(String),
}

/// Errors from the generation engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("content blocked by safety settings: {0}")]
    SafetyBlocked(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine error: {0}")]
    Unknown(String),
}

/// Errors surfaced by session operations to the transport layer.
///
/// An unknown session id is reported distinctly from transient
/// infrastructure failure: the former is a client error, the latter is
/// retryable.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("generation engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("generation engine rejected request: {0}")]
    EngineRejected(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("session store rejected operation: {0}")]
    StoreRejected(String),

    #[error("cache/store inconsistency: {0}")]
    Inconsistency(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SessionError::NotFound,
            StoreError::Unavailable(msg) => SessionError::StoreUnavailable(msg),
            StoreError::Rejected(msg) => SessionError::StoreRejected(msg),
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidArgument(msg) => SessionError::EngineRejected(msg),
            EngineError::SafetyBlocked(msg) => SessionError::EngineRejected(msg),
            // No distinct taxonomy entry for unclassified engine failures;
            // treat them as retryable rather than telling clients to give up.
            EngineError::Unavailable(msg) | EngineError::Unknown(msg) => {
                SessionError::EngineUnavailable(msg)
            }
        }
    }
}
