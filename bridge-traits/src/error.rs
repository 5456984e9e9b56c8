use thiserror::Error;

/// Failure of a host capability (storage, connectivity probe, logging sink).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error returned by the identity backend or the profile store.
///
/// The backend speaks in free-form messages; `message` is kept verbatim
/// because the credential flow classifies failures by inspecting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    /// Machine string reported by the backend (e.g. `"Failed to fetch"`).
    pub message: String,
    /// HTTP status when the failure came from a response.
    pub status: Option<u16>,
    /// Backend error code when one was provided (e.g. `"otp_expired"`).
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Error for an optional backend capability the adapter does not offer.
    pub fn unsupported(operation: &str) -> Self {
        Self::new(format!("{} is not supported by this backend", operation))
            .with_code("unsupported")
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_builder() {
        let err = BackendError::new("Email rate limit exceeded")
            .with_status(429)
            .with_code("over_email_send_rate_limit");

        assert_eq!(err.to_string(), "Email rate limit exceeded");
        assert_eq!(err.status, Some(429));
        assert_eq!(err.code.as_deref(), Some("over_email_send_rate_limit"));
    }

    #[test]
    fn test_unsupported_carries_code() {
        let err = BackendError::unsupported("upsert");
        assert_eq!(err.code.as_deref(), Some("unsupported"));
        assert!(err.message.contains("upsert"));
    }
}
