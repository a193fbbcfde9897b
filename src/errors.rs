use thiserror::Error;

/// Pipeline failure taxonomy. Analysis failures and persistence failures are
/// deliberately absent: the handler downgrades the former to a synthetic
/// finding and the recorder swallows the latter, so neither ever reaches the
/// HTTP status mapping.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Client input rejected before any external call. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// Repository could not be materialized. Maps to 422.
    #[error("{message}: {details}")]
    Materialization { message: String, details: String },

    /// Anything uncaught. Maps to 500 with a generic envelope.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ScanError {
    pub fn validation(message: impl Into<String>) -> Self {
        ScanError::Validation(message.into())
    }

    pub fn materialization(message: impl Into<String>, details: impl Into<String>) -> Self {
        ScanError::Materialization {
            message: message.into(),
            details: details.into(),
        }
    }
}
