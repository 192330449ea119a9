//! Vendor adapter error types.

use hcm_core::HcmError;

/// Result type for vendor adapter calls.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Errors that can occur when calling a cloud vendor.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The vendor (or gateway) returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The adapter does not implement the operation.
    #[error("{operation} is not supported for {vendor}/{kind}")]
    Unsupported {
        /// Vendor name.
        vendor: String,
        /// Resource kind.
        kind: String,
        /// The missing operation.
        operation: &'static str,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CloudError {
    /// Attach the vendor name when converting into the shared error type.
    #[must_use]
    pub fn into_hcm(self, vendor: &str) -> HcmError {
        match self {
            Self::InvalidRequest(msg) | Self::Configuration(msg) => HcmError::InvalidParameter(msg),
            unsupported @ Self::Unsupported { .. } => {
                HcmError::InvalidParameter(unsupported.to_string())
            }
            other => HcmError::upstream(vendor, other.to_string()),
        }
    }
}

impl From<CloudError> for HcmError {
    fn from(err: CloudError) -> Self {
        err.into_hcm("cloud")
    }
}
