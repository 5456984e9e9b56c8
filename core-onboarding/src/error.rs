use bridge_traits::BridgeError;
use std::fmt;
use thiserror::Error;

use crate::step::WizardStep;

/// Phase of the profile sync that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ExistenceCheck,
    CreateRow,
    Upsert,
    UpdateProfile,
    UpdateMetadata,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::ExistenceCheck => "existence_check",
            SyncStage::CreateRow => "create_row",
            SyncStage::Upsert => "upsert",
            SyncStage::UpdateProfile => "update_profile",
            SyncStage::UpdateMetadata => "update_metadata",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum OnboardingError {
    /// `Next` was blocked by the step's validator.
    #[error("Step {step} is incomplete: {message}")]
    Validation { step: WizardStep, message: String },

    #[error("Cannot {action} from step {from}")]
    InvalidTransition { from: WizardStep, action: String },

    #[error("Profile sync failed at {stage}: {message}")]
    Sync { stage: SyncStage, message: String },

    #[error("Draft storage error: {0}")]
    Storage(#[from] BridgeError),
}

impl OnboardingError {
    /// What the wizard tells the user; sync failures stay generic.
    pub fn user_message(&self) -> String {
        match self {
            OnboardingError::Validation { message, .. } => message.clone(),
            OnboardingError::InvalidTransition { .. } => {
                "That step isn't available right now.".to_string()
            }
            OnboardingError::Sync { .. } | OnboardingError::Storage(_) => {
                "We couldn't save your profile. Your answers are kept; please try again."
                    .to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, OnboardingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_keep_user_message_generic() {
        let sync = OnboardingError::Sync {
            stage: SyncStage::UpdateMetadata,
            message: "JWT expired".to_string(),
        };
        let storage = OnboardingError::from(BridgeError::OperationFailed("quota".to_string()));

        assert_eq!(sync.to_string(), "Profile sync failed at update_metadata: JWT expired");
        assert!(!sync.user_message().contains("JWT"));
        assert_eq!(sync.user_message(), storage.user_message());
    }

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = OnboardingError::Validation {
            step: WizardStep::Basics,
            message: "Please enter your full name.".to_string(),
        };
        assert_eq!(err.user_message(), "Please enter your full name.");
    }
}
