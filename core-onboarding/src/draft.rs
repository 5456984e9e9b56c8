//! Resumable wizard draft kept in host key-value storage.
//!
//! The draft lives under two keys: the 1-based step number and the JSON
//! encoded [`UserData`]. The pair is not written atomically; `save` writes
//! the data before the step so an interrupted save never points the wizard
//! past the answers it has.

use std::sync::Arc;

use bridge_traits::storage::{get_json, set_json, KeyValueStore};
use core_runtime::config::OnboardingSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::step::WizardStep;
use crate::types::UserData;

/// The wizard's in-progress, not yet committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingDraft {
    pub step: WizardStep,
    pub data: UserData,
}

impl Default for OnboardingDraft {
    fn default() -> Self {
        Self {
            step: WizardStep::FIRST,
            data: UserData::default(),
        }
    }
}

pub struct DraftStore {
    kv: Arc<dyn KeyValueStore>,
    keys: OnboardingSettings,
}

impl DraftStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: OnboardingSettings) -> Self {
        Self { kv, keys }
    }

    pub fn keys(&self) -> &OnboardingSettings {
        &self.keys
    }

    /// Load the persisted draft, if any.
    ///
    /// Never fails: unreadable storage yields `None`, a corrupt data record
    /// falls back to defaults and an out-of-range step restarts at step 1.
    pub async fn load(&self) -> Option<OnboardingDraft> {
        let progress = match self.kv.get_string(&self.keys.progress_key).await {
            Ok(progress) => progress,
            Err(err) => {
                warn!(error = %err, "Failed to read onboarding progress");
                return None;
            }
        };

        let data = match get_json::<UserData>(self.kv.as_ref(), &self.keys.data_key).await {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "Discarding unreadable onboarding data");
                Some(UserData::default())
            }
        };

        if progress.is_none() && data.is_none() {
            return None;
        }

        let step = progress
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u8>().ok())
            .and_then(WizardStep::from_number)
            .unwrap_or_else(|| {
                if let Some(raw) = &progress {
                    warn!(progress = %raw, "Invalid onboarding progress, restarting at step 1");
                }
                WizardStep::FIRST
            });

        debug!(step = step.number(), "Loaded onboarding draft");
        Some(OnboardingDraft {
            step,
            data: data.unwrap_or_default(),
        })
    }

    pub async fn save(&self, draft: &OnboardingDraft) -> Result<()> {
        set_json(self.kv.as_ref(), &self.keys.data_key, &draft.data).await?;
        self.kv
            .set_string(&self.keys.progress_key, &draft.step.number().to_string())
            .await?;
        Ok(())
    }

    /// Remove both keys; the next `load` returns `None`.
    pub async fn clear(&self) -> Result<()> {
        self.kv.remove(&self.keys.progress_key).await?;
        self.kv.remove(&self.keys.data_key).await?;
        debug!("Cleared onboarding draft");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_auth::testing::MemoryKeyValueStore;

    fn store() -> (DraftStore, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        (DraftStore::new(kv.clone(), OnboardingSettings::default()), kv)
    }

    #[tokio::test]
    async fn test_resume_restores_step_and_fields() {
        let (drafts, kv) = store();
        let draft = OnboardingDraft {
            step: WizardStep::Preferences,
            data: UserData {
                full_name: "Dr. Sam Lee".into(),
                specialty: "Orthodontics".into(),
                country: "US".into(),
                ..Default::default()
            },
        };

        drafts.save(&draft).await.unwrap();

        assert_eq!(kv.get("onboarding_progress").as_deref(), Some("4"));
        assert_eq!(drafts.load().await, Some(draft));
    }

    #[tokio::test]
    async fn test_nothing_persisted() {
        let (drafts, _) = store();
        assert_eq!(drafts.load().await, None);
    }

    #[tokio::test]
    async fn test_out_of_range_step_restarts_at_first() {
        let (drafts, kv) = store();
        kv.insert("onboarding_progress", "9");
        kv.insert("onboarding_data", r#"{"full_name":"Sam"}"#);

        let draft = drafts.load().await.unwrap();
        assert_eq!(draft.step, WizardStep::Basics);
        assert_eq!(draft.data.full_name, "Sam");
    }

    #[tokio::test]
    async fn test_corrupt_data_falls_back_to_defaults() {
        let (drafts, kv) = store();
        kv.insert("onboarding_progress", "3");
        kv.insert("onboarding_data", "{not json");

        let draft = drafts.load().await.unwrap();
        assert_eq!(draft.step, WizardStep::Location);
        assert_eq!(draft.data, UserData::default());
    }

    #[tokio::test]
    async fn test_clear_removes_both_keys() {
        let (drafts, kv) = store();
        drafts.save(&OnboardingDraft::default()).await.unwrap();
        kv.insert("unrelated", "kept");

        drafts.clear().await.unwrap();

        assert_eq!(kv.keys(), vec!["unrelated".to_string()]);
        assert_eq!(drafts.load().await, None);
    }

    #[tokio::test]
    async fn test_failed_write_surfaces_storage_error() {
        let (drafts, kv) = store();
        kv.fail_writes(true);

        let err = drafts.save(&OnboardingDraft::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::OnboardingError::Storage(_)));
    }
}
