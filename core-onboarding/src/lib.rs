//! # Onboarding Module
//!
//! The profile-completion flow that gates first full access to the app.
//!
//! ## Overview
//!
//! - [`OnboardingGate`]: decides from the auth snapshot whether the wizard
//!   must run
//! - [`OnboardingWizard`]: a six step state machine with per-step
//!   validation, skip rules and jump-back from the review
//! - [`DraftStore`]: resumable draft in host key-value storage
//! - [`ProfileSyncEngine`]: commits the draft to the profile store and the
//!   principal's metadata without ever inserting a row twice

pub mod draft;
pub mod error;
pub mod gate;
pub mod step;
pub mod sync;
pub mod types;
pub mod wizard;

pub use draft::{DraftStore, OnboardingDraft};
pub use error::{OnboardingError, Result, SyncStage};
pub use gate::OnboardingGate;
pub use step::{transition, validate_step, StepAction, StepValidation, WizardStep};
pub use sync::{ProfileSyncEngine, ProfileWrite, SyncOutcome};
pub use types::{
    CommunicationPreferences, ContactChannel, Coordinates, LocationPermission, PriceRange,
    UserData, UserDataPatch,
};
pub use wizard::OnboardingWizard;
