//! Onboarding wizard state machine.
//!
//! Holds the current draft, applies navigation through the transition
//! table in [`crate::step`], and persists the draft after every change so a
//! reload resumes where the user left off.

use std::sync::Arc;

use bridge_traits::telemetry::{ErrorReport, ErrorTracker};
use core_auth::Principal;
use core_runtime::events::{CoreEvent, EventBus, Notice, OnboardingEvent};
use tracing::{debug, info, instrument, warn};

use crate::draft::{DraftStore, OnboardingDraft};
use crate::error::{OnboardingError, Result};
use crate::step::{transition, validate_step, StepAction, StepValidation, WizardStep};
use crate::sync::{ProfileSyncEngine, ProfileWrite, SyncOutcome};
use crate::types::{UserData, UserDataPatch};

pub struct OnboardingWizard {
    drafts: DraftStore,
    event_bus: EventBus,
    tracker: Arc<dyn ErrorTracker>,
    draft: OnboardingDraft,
    email_locked: bool,
}

impl OnboardingWizard {
    /// Open the wizard, resuming a persisted draft when one exists.
    ///
    /// A principal with a verified email has it written into the draft and
    /// locked for the rest of the session.
    #[instrument(skip_all)]
    pub async fn open(
        drafts: DraftStore,
        principal: Option<&Principal>,
        event_bus: EventBus,
        tracker: Arc<dyn ErrorTracker>,
    ) -> Self {
        let mut draft = match drafts.load().await {
            Some(draft) => {
                info!(step = draft.step.number(), "Resuming onboarding draft");
                let _ = event_bus.emit(CoreEvent::Onboarding(OnboardingEvent::DraftRestored {
                    step: draft.step.number(),
                }));
                draft
            }
            None => OnboardingDraft::default(),
        };

        let verified_email = principal.and_then(Principal::verified_email);
        if let Some(email) = verified_email {
            draft.data.email = email.to_string();
        }
        if draft.data.full_name.trim().is_empty() {
            if let Some(name) = principal.and_then(Principal::display_name) {
                draft.data.full_name = name.to_string();
            }
        }

        let wizard = Self {
            drafts,
            event_bus,
            tracker,
            draft,
            email_locked: verified_email.is_some(),
        };
        wizard.persist().await;
        wizard
    }

    pub fn current_step(&self) -> WizardStep {
        self.draft.step
    }

    pub fn data(&self) -> &UserData {
        &self.draft.data
    }

    pub fn draft(&self) -> &OnboardingDraft {
        &self.draft
    }

    /// `true` when the email came from the signed-in principal.
    pub fn is_email_locked(&self) -> bool {
        self.email_locked
    }

    pub fn can_skip(&self) -> bool {
        self.draft.step.is_skippable(&self.draft.data)
    }

    pub fn validation(&self) -> StepValidation {
        validate_step(self.draft.step, &self.draft.data)
    }

    /// Merge `patch` into the draft. A locked email is never overwritten.
    pub async fn update_user_data(&mut self, mut patch: UserDataPatch) {
        if self.email_locked && patch.email.take().is_some() {
            debug!("Ignoring edit of verified email");
        }
        self.draft.data.apply(patch);
        self.persist().await;
    }

    /// Advance if the current step validates; otherwise surface its message.
    pub async fn next(&mut self) -> Result<WizardStep> {
        let step = self.draft.step;
        let check = validate_step(step, &self.draft.data);
        if !check.valid {
            let message = check
                .message
                .unwrap_or_else(|| "Please complete this step.".to_string());
            debug!(step = step.number(), reason = %message, "Step blocked by validation");
            self.event_bus
                .notify(Notice::warning(step.title(), message.clone()));
            return Err(OnboardingError::Validation { step, message });
        }
        self.go(StepAction::Next).await
    }

    pub async fn back(&mut self) -> Result<WizardStep> {
        self.go(StepAction::Back).await
    }

    pub async fn skip(&mut self) -> Result<WizardStep> {
        self.go(StepAction::Skip).await
    }

    /// "Edit" from the review: jump straight back to an earlier step.
    pub async fn jump_to(&mut self, target: WizardStep) -> Result<WizardStep> {
        self.go(StepAction::JumpTo(target)).await
    }

    async fn go(&mut self, action: StepAction) -> Result<WizardStep> {
        let from = self.draft.step;
        let to = transition(from, action, &self.draft.data).ok_or_else(|| {
            OnboardingError::InvalidTransition {
                from,
                action: action.label().to_string(),
            }
        })?;

        self.draft.step = to;
        let _ = self
            .event_bus
            .emit(CoreEvent::Onboarding(OnboardingEvent::StepChanged {
                from: from.number(),
                to: to.number(),
                via: action.label().to_string(),
            }));
        self.persist().await;
        Ok(to)
    }

    /// Commit the draft through `sync`.
    ///
    /// Only the review step completes. On success both draft keys are
    /// removed; on failure the draft stays exactly as it was so the user can
    /// retry.
    #[instrument(skip_all, fields(principal = %principal.id))]
    pub async fn complete(
        &mut self,
        sync: &ProfileSyncEngine,
        principal: &Principal,
    ) -> Result<SyncOutcome> {
        let from = self.draft.step;
        if !from.is_terminal() {
            return Err(OnboardingError::InvalidTransition {
                from,
                action: "complete".to_string(),
            });
        }

        let outcome = match sync.sync(principal, &self.draft.data).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_failure(&err);
                return Err(err);
            }
        };

        if let Err(err) = self.drafts.clear().await {
            warn!(error = %err, "Failed to clear onboarding draft");
        }

        info!(profile = ?outcome.profile, "Onboarding completed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Onboarding(OnboardingEvent::Completed {
                principal_id: principal.id.to_string(),
                created_profile: outcome.profile == ProfileWrite::Created,
            }));
        self.event_bus.notify(Notice::success(
            "Profile complete",
            "Welcome aboard! Your profile has been saved.",
        ));
        Ok(outcome)
    }

    fn report_failure(&self, err: &OnboardingError) {
        let stage = match err {
            OnboardingError::Sync { stage, .. } => stage.as_str(),
            _ => "unknown",
        };
        warn!(stage, error = %err, "Onboarding completion failed");

        self.tracker.track_error(
            ErrorReport::new("onboarding.complete", "profile_sync", err.to_string())
                .with_context("stage", stage)
                .with_context("step", self.draft.step.number().to_string()),
        );
        let _ = self
            .event_bus
            .emit(CoreEvent::Onboarding(OnboardingEvent::SyncFailed {
                stage: stage.to_string(),
                message: err.to_string(),
            }));
        self.event_bus
            .notify(Notice::error("Profile not saved", err.user_message()));
    }

    async fn persist(&self) {
        if let Err(err) = self.drafts.save(&self.draft).await {
            warn!(error = %err, "Failed to persist onboarding draft");
        }
    }
}

impl std::fmt::Debug for OnboardingWizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingWizard")
            .field("step", &self.draft.step)
            .field("email_locked", &self.email_locked)
            .finish()
    }
}
