//! Errors - inference and predictor failures, plus their operational kind
//!
//! Nothing in the core recovers from these. They travel up to the session
//! owner, which decides whether to abort the episode, retry the step or
//! substitute a safe action.

use std::time::Duration;

/// ErrorKind classifies a failure for the session owner.
///
/// - Transient: the same request may succeed later (timeout, endpoint down)
/// - Permanent: retrying the same step will fail the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Discriminant of [`InferenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    Unreachable,
    Timeout,
    BadResponse,
    SchemaMismatch,
}

/// Failure of one remote policy call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("policy endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("policy endpoint {endpoint} did not answer within {after:?}")]
    Timeout { endpoint: String, after: Duration },

    #[error("policy endpoint {endpoint} answered with status {status}")]
    BadResponse { endpoint: String, status: u16 },

    #[error("policy endpoint {endpoint} returned an unusable action: {reason}")]
    SchemaMismatch { endpoint: String, reason: String },
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            Self::Unreachable { .. } => InferenceErrorKind::Unreachable,
            Self::Timeout { .. } => InferenceErrorKind::Timeout,
            Self::BadResponse { .. } => InferenceErrorKind::BadResponse,
            Self::SchemaMismatch { .. } => InferenceErrorKind::SchemaMismatch,
        }
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self.kind() {
            InferenceErrorKind::Unreachable | InferenceErrorKind::Timeout => ErrorKind::Transient,
            InferenceErrorKind::BadResponse | InferenceErrorKind::SchemaMismatch => {
                ErrorKind::Permanent
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Unreachable { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::BadResponse { endpoint, .. }
            | Self::SchemaMismatch { endpoint, .. } => endpoint,
        }
    }
}

/// Failure of `RateLimitedPredictor::get_action`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictorError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// A cached action was needed at `iteration` but no control iteration
    /// has succeeded yet.
    #[error("no cached action to serve at iteration {iteration}: no control iteration has succeeded yet")]
    Initialization { iteration: u64 },
}

impl PredictorError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Inference(e) => e.error_kind(),
            Self::Initialization { .. } => ErrorKind::Permanent,
        }
    }
}
