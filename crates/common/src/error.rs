//! Common error types shared across crates.

use thiserror::Error;

/// Top-level gateway error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::EnvelopeRejected`] → 422
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: missing header, unknown version token, or invalid JSON.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The sealed request could not be opened (key unwrap, tag, or padding failure).
    #[error("envelope rejected: {0}")]
    EnvelopeRejected(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::EnvelopeRejected(_) => 422,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in the error response body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::EnvelopeRejected(_) => "envelope_rejected",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
