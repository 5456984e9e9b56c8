use serde::{Deserialize, Serialize};

/// Whether the user allowed the Location step to read their position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPermission {
    #[default]
    NotRequested,
    Granted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Deal size bounds, in whole currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    #[default]
    Email,
    Phone,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationPreferences {
    pub email_updates: bool,
    pub sms_alerts: bool,
    pub newsletter: bool,
    pub preferred_channel: ContactChannel,
}

impl Default for CommunicationPreferences {
    fn default() -> Self {
        Self {
            email_updates: true,
            sms_alerts: false,
            newsletter: false,
            preferred_channel: ContactChannel::Email,
        }
    }
}

/// Everything the wizard collects, grouped by the step that asks for it.
///
/// Serialized as the draft's data record, so unknown or missing fields fall
/// back to defaults when an older draft is resumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    // Basics
    pub full_name: String,
    pub email: String,
    pub phone: String,

    // Practice
    pub specialty: String,
    pub practice_name: String,
    pub practice_type: String,
    pub years_experience: Option<u32>,
    pub bio: String,
    pub website: String,

    // Location
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub location_permission: LocationPermission,
    pub coordinates: Option<Coordinates>,

    // Preferences
    pub deal_preferences: Vec<String>,
    pub price_range: PriceRange,
    pub preferred_brands: Vec<String>,

    // Communication
    pub communication: CommunicationPreferences,
}

impl UserData {
    /// Merge the fields present in `patch`; absent fields keep their value.
    pub fn apply(&mut self, patch: UserDataPatch) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut self.full_name, patch.full_name);
        set(&mut self.email, patch.email);
        set(&mut self.phone, patch.phone);
        set(&mut self.specialty, patch.specialty);
        set(&mut self.practice_name, patch.practice_name);
        set(&mut self.practice_type, patch.practice_type);
        set(&mut self.years_experience, patch.years_experience.map(Some));
        set(&mut self.bio, patch.bio);
        set(&mut self.website, patch.website);
        set(&mut self.street_address, patch.street_address);
        set(&mut self.city, patch.city);
        set(&mut self.state, patch.state);
        set(&mut self.postal_code, patch.postal_code);
        set(&mut self.country, patch.country);
        set(&mut self.location_permission, patch.location_permission);
        set(&mut self.coordinates, patch.coordinates.map(Some));
        set(&mut self.deal_preferences, patch.deal_preferences);
        set(&mut self.price_range, patch.price_range);
        set(&mut self.preferred_brands, patch.preferred_brands);
        set(&mut self.communication, patch.communication);
    }

    /// Email local-part, when one is known.
    pub(crate) fn email_local_part(&self) -> Option<&str> {
        self.email
            .trim()
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
    }
}

/// A partial update of [`UserData`]; `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDataPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub practice_name: Option<String>,
    pub practice_type: Option<String>,
    pub years_experience: Option<u32>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub location_permission: Option<LocationPermission>,
    pub coordinates: Option<Coordinates>,
    pub deal_preferences: Option<Vec<String>>,
    pub price_range: Option<PriceRange>,
    pub preferred_brands: Option<Vec<String>>,
    pub communication: Option<CommunicationPreferences>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut data = UserData {
            full_name: "Dr. Sam Lee".into(),
            specialty: "Orthodontics".into(),
            ..Default::default()
        };

        data.apply(UserDataPatch {
            practice_name: Some("Bright Smiles".into()),
            years_experience: Some(12),
            ..Default::default()
        });

        assert_eq!(data.full_name, "Dr. Sam Lee");
        assert_eq!(data.specialty, "Orthodontics");
        assert_eq!(data.practice_name, "Bright Smiles");
        assert_eq!(data.years_experience, Some(12));
    }

    #[test]
    fn test_old_drafts_fill_missing_fields_with_defaults() {
        let data: UserData =
            serde_json::from_str(r#"{"full_name":"Sam","deal_preferences":["acquisition"]}"#)
                .unwrap();
        assert_eq!(data.full_name, "Sam");
        assert_eq!(data.deal_preferences, vec!["acquisition".to_string()]);
        assert_eq!(data.location_permission, LocationPermission::NotRequested);
        assert!(data.communication.email_updates);
    }

    #[test]
    fn test_email_local_part() {
        let data = UserData {
            email: " dr.lee@example.com ".into(),
            ..Default::default()
        };
        assert_eq!(data.email_local_part(), Some("dr.lee"));
        assert_eq!(UserData::default().email_local_part(), None);
    }
}
