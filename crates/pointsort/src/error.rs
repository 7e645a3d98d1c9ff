use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors that abort a tracking cycle or a tracking session.
///
/// Missing detections and tracks ageing out are part of the normal track lifecycle and are never reported through this type.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A detection, measurement or state vector has the wrong number of components.
    #[error("dimension mismatch: expected {expected} components, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A cost matrix does not have one row per track and one column per detection.
    #[error("cost matrix shape mismatch: expected (tracks, detections) = {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The optimal assignment could not be computed for the cost matrix.
    #[error("assignment solver failed: {0}")]
    SolverFailure(String),

    /// No configured history bucket covers the requested history length.
    #[error("no history bucket covers a history of length {length}")]
    UnknownBucket { length: usize },

    /// Configuration rejected at session setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The Kalman innovation covariance could not be inverted.
    #[error("innovation covariance is singular")]
    SingularInnovation,

    /// The external extrapolation model failed.
    #[error("predictor failed: {0}")]
    Predictor(#[source] anyhow::Error),

    /// A previous cycle failed part way through mutating the track set.
    #[error("tracking session failed: {0}")]
    SessionFailed(String),
}
