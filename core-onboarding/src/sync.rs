//! Profile Sync Engine: commits a finished draft to the profile store and
//! to the principal's identity metadata.
//!
//! ## Sequence
//!
//! 1. Existence check on the profile row keyed by the principal id.
//!    "No rows" is a normal outcome.
//! 2. Create a minimal row (id, display name, generated username) only if
//!    the check found nothing. Stores with a native upsert replace steps
//!    1-3 with a single upsert of the full row.
//! 3. Update the row with every collected profile field.
//! 4. Write onboarding data into identity metadata, setting
//!    `onboarding_completed` and `has_set_password` in the same call.
//!
//! Any failure stops the sequence. Because step 2 is guarded by step 1, the
//! whole run can be repeated after a failure without a second insert.

use std::sync::Arc;

use bridge_traits::error::BackendError;
use bridge_traits::identity::{BackendUser, IdentityBackend, UserUpdate};
use bridge_traits::profile::{ProfileRow, ProfileStore};
use bridge_traits::time::Clock;
use core_auth::{Principal, HAS_SET_PASSWORD, ONBOARDING_COMPLETED};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{OnboardingError, Result, SyncStage};
use crate::types::UserData;

/// How the profile row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileWrite {
    /// No row existed; a minimal row was inserted and then updated.
    Created,
    /// An existing row was updated in place.
    Updated,
    /// The store's native upsert wrote the full row.
    Upserted,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub profile: ProfileWrite,
    /// The principal as returned by the metadata write.
    pub user: BackendUser,
}

pub struct ProfileSyncEngine {
    profiles: Arc<dyn ProfileStore>,
    identity: Arc<dyn IdentityBackend>,
    clock: Arc<dyn Clock>,
}

impl ProfileSyncEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        identity: Arc<dyn IdentityBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            identity,
            clock,
        }
    }

    #[instrument(skip_all, fields(principal = %principal.id))]
    pub async fn sync(&self, principal: &Principal, data: &UserData) -> Result<SyncOutcome> {
        let id = principal.id.to_string();

        let profile = if self.profiles.supports_upsert() {
            let mut row = self.full_row(&id, data);
            row.username = Some(self.username(principal, data));
            if row.full_name.is_none() {
                row.full_name = display_name(principal, data);
            }
            self.profiles
                .upsert(&row)
                .await
                .map_err(|e| failed(SyncStage::Upsert, e))?;
            ProfileWrite::Upserted
        } else {
            let existing = self
                .profiles
                .select(&id)
                .await
                .map_err(|e| failed(SyncStage::ExistenceCheck, e))?;

            let profile = match existing {
                Some(_) => {
                    debug!("Profile row exists, skipping create");
                    ProfileWrite::Updated
                }
                None => {
                    let row = ProfileRow {
                        full_name: display_name(principal, data),
                        username: Some(self.username(principal, data)),
                        email: non_empty(&data.email).or_else(|| principal.email.clone()),
                        ..ProfileRow::new(id.as_str())
                    };
                    self.profiles
                        .insert(&row)
                        .await
                        .map_err(|e| failed(SyncStage::CreateRow, e))?;
                    info!("Created profile row");
                    ProfileWrite::Created
                }
            };

            self.profiles
                .update(&self.full_row(&id, data), &id)
                .await
                .map_err(|e| failed(SyncStage::UpdateProfile, e))?;
            profile
        };

        let update = UserUpdate {
            password: None,
            metadata: Some(completion_metadata(data)),
        };
        let user = self
            .identity
            .update_user(update)
            .await
            .map_err(|e| failed(SyncStage::UpdateMetadata, e))?;

        info!(profile = ?profile, "Profile sync finished");
        Ok(SyncOutcome { profile, user })
    }

    fn full_row(&self, id: &str, data: &UserData) -> ProfileRow {
        ProfileRow {
            full_name: non_empty(&data.full_name),
            email: non_empty(&data.email),
            phone: non_empty(&data.phone),
            specialty: non_empty(&data.specialty),
            practice_name: non_empty(&data.practice_name),
            practice_type: non_empty(&data.practice_type),
            years_experience: data.years_experience,
            bio: non_empty(&data.bio),
            website: non_empty(&data.website),
            street_address: non_empty(&data.street_address),
            city: non_empty(&data.city),
            state: non_empty(&data.state),
            postal_code: non_empty(&data.postal_code),
            country: non_empty(&data.country),
            deal_preferences: Some(data.deal_preferences.clone()),
            ..ProfileRow::new(id)
        }
    }

    /// Username from the email local-part, or a time-based placeholder.
    fn username(&self, principal: &Principal, data: &UserData) -> String {
        let local_part = data
            .email_local_part()
            .or_else(|| principal.email.as_deref()?.split('@').next())
            .map(sanitize_username)
            .filter(|name| !name.is_empty());

        local_part.unwrap_or_else(|| {
            warn!("No email known, generating placeholder username");
            format!("user_{}", self.clock.unix_timestamp_millis())
        })
    }
}

fn failed(stage: SyncStage, err: BackendError) -> OnboardingError {
    warn!(stage = %stage, error = %err, "Profile sync step failed");
    OnboardingError::Sync {
        stage,
        message: err.message,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn display_name(principal: &Principal, data: &UserData) -> Option<String> {
    non_empty(&data.full_name).or_else(|| principal.display_name().map(str::to_string))
}

fn sanitize_username(local_part: &str) -> String {
    local_part
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Metadata merged into the principal when onboarding completes.
fn completion_metadata(data: &UserData) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(ONBOARDING_COMPLETED.to_string(), Value::Bool(true));
    metadata.insert(HAS_SET_PASSWORD.to_string(), Value::Bool(true));

    let mut put = |key: &str, value: Value| {
        metadata.insert(key.to_string(), value);
    };
    if let Some(name) = non_empty(&data.full_name) {
        put("full_name", Value::String(name));
    }
    put("specialty", json!(data.specialty));
    put("practice_name", json!(data.practice_name));
    put(
        "location",
        json!({
            "street_address": data.street_address,
            "city": data.city,
            "state": data.state,
            "postal_code": data.postal_code,
            "country": data.country,
            "permission": data.location_permission,
            "coordinates": data.coordinates,
        }),
    );
    put("communication", json!(data.communication));
    put("price_range", json!(data.price_range));
    put("preferred_brands", json!(data.preferred_brands));
    put("deal_preferences", json!(data.deal_preferences));
    metadata
}
