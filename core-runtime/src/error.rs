//! Errors raised while assembling the runtime: configuration validation,
//! missing collaborators and logging setup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required collaborator (identity backend, profile store, storage)
    /// was not injected and no desktop fallback applies.
    #[error("Missing collaborator: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// A desktop fallback could not be brought up (runtime, SQLite file).
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_cause() {
        let missing = Error::CapabilityMissing {
            capability: "ProfileStore".to_string(),
            message: "inject a profile store adapter".to_string(),
        };
        assert_eq!(
            missing.to_string(),
            "Missing collaborator: ProfileStore - inject a profile store adapter"
        );
        assert_eq!(
            Error::Internal("Failed to initialize default KeyValueStore: locked".to_string())
                .to_string(),
            "Internal error: Failed to initialize default KeyValueStore: locked"
        );
    }
}
