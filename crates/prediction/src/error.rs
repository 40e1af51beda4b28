use thiserror::Error;

/// Failure of a prediction call.
///
/// Every variant is a *dependency* failure: the product workflow degrades to "no
/// prediction" rather than failing the caller's operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    #[error("prediction timed out after {0} ms")]
    Timeout(u64),

    #[error("prediction transport error: {0}")]
    Transport(String),

    #[error("prediction service answered with status {0}")]
    Status(u16),

    #[error("malformed prediction payload: {0}")]
    Malformed(String),

    /// The service answered `{"error": ...}`.
    #[error("prediction rejected: {0}")]
    Rejected(String),
}
