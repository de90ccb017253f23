//! Error types for usdm-uploader
//!
//! Failures fall into three classes:
//! - fatal to the call: [`OsbError::Remote`], [`OsbError::Network`], [`OsbError::Parse`],
//!   [`OsbError::NotFound`]; propagated with `?`
//! - recoverable: [`OsbError::ValidationRejected`] and [`OsbError::AlreadyApproved`];
//!   matched by the caller and turned into an alternate path
//! - soft: per-item failures inside batch loops; logged and skipped

use thiserror::Error;

/// OSB API error
#[derive(Debug, Error)]
pub enum OsbError {
    /// Resource not found (404, or a lookup that came back empty)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload rejected by validation (422)
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    /// Approval of an entity that is no longer in draft
    #[error("Already approved: {0}")]
    AlreadyApproved(String),

    /// Any other non-2xx response
    #[error("OSB API error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl OsbError {
    pub fn is_validation_rejected(&self) -> bool {
        matches!(self, OsbError::ValidationRejected(_))
    }

    pub fn is_already_approved(&self) -> bool {
        matches!(self, OsbError::AlreadyApproved(_))
    }
}

impl From<reqwest::Error> for OsbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            OsbError::Parse(e.to_string())
        } else {
            OsbError::Network(e.to_string())
        }
    }
}

/// Pipeline-level error
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Osb(#[from] OsbError),

    #[error(transparent)]
    Common(#[from] usdm_common::Error),

    /// Input document cannot be replicated as-is
    #[error("Invalid study definition: {0}")]
    InvalidInput(String),
}

/// Result type for OSB calls
pub type OsbResult<T> = Result<T, OsbError>;

/// Result type for pipeline operations
pub type UploadResult<T> = Result<T, UploadError>;
