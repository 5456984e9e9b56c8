use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] core_onboarding::OnboardingError),

    #[error("The onboarding wizard is not open")]
    WizardNotOpen,
}

pub type Result<T> = std::result::Result<T, CoreError>;
